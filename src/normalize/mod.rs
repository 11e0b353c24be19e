//! Mapping of raw upstream records onto the canonical [`Review`].
//!
//! Each platform names the same concepts differently, so every platform gets
//! its own [`RecordNormalizer`]. The implementations only remap fields into a
//! [`RecordFields`]; validation and timestamp handling are shared here.

mod apple;
mod google;
mod trustpilot;

pub use apple::AppleNormalizer;
pub use google::GoogleNormalizer;
pub use trustpilot::TrustpilotNormalizer;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use log::warn;
use serde_json::Value;

use crate::{
    error::NormalizeError,
    models::{Review, Source, ANONYMOUS_AUTHOR},
};

/// Reviews recovered from one upstream page.
#[derive(Debug, Clone, Default)]
pub struct NormalizedPage {
    pub reviews: Vec<Review>,
    /// Number of raw records on the page, including dropped ones.
    pub raw_count: usize,
}

pub trait RecordNormalizer: Send + Sync {
    fn source(&self) -> Source;

    /// Convert one raw record. `parsed_at` stands in for a missing timestamp.
    fn normalize_record(
        &self,
        raw: &Value,
        parsed_at: DateTime<Utc>,
    ) -> Result<Review, NormalizeError>;

    /// Convert every record of a page, dropping the ones that cannot be parsed.
    fn normalize_page(&self, payload: &Value) -> NormalizedPage {
        let records = page_records(payload);
        let parsed_at = Utc::now();
        let mut page = NormalizedPage {
            reviews: Vec::with_capacity(records.len()),
            raw_count: records.len(),
        };

        for raw in records {
            match self.normalize_record(raw, parsed_at) {
                Ok(review) => page.reviews.push(review),
                Err(err) => warn!("Dropping {} review: {err}", self.source()),
            }
        }

        page
    }
}

/// Records live under `reviews`; a bare array is accepted as well.
fn page_records(payload: &Value) -> &[Value] {
    match payload {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => map
            .get("reviews")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    }
}

/// Platform-neutral view of a raw record, filled in by each normalizer.
#[derive(Debug, Default)]
///
/// Text fields stay untyped so that a number where a string was expected
/// costs only that field, not the record.
pub(crate) struct RecordFields {
    pub id: Option<Value>,
    pub author: Option<Value>,
    pub rating: Option<Value>,
    pub title: Option<Value>,
    pub content: Option<Value>,
    pub timestamp: Option<Value>,
    pub helpful: Option<Value>,
    pub app_version: Option<Value>,
}

impl RecordFields {
    pub fn into_review(
        self,
        source: Source,
        parsed_at: DateTime<Utc>,
    ) -> Result<Review, NormalizeError> {
        let id = scalar_text(self.id.as_ref()).ok_or(NormalizeError::MissingId)?;

        let rating = parse_rating(self.rating.as_ref());
        if !(1..=5).contains(&rating) {
            return Err(NormalizeError::InvalidRating {
                id,
                raw: self
                    .rating
                    .map(|value| value.to_string())
                    .unwrap_or_else(|| "null".into()),
            });
        }

        Ok(Review {
            id,
            author: non_empty(self.author).unwrap_or_else(|| ANONYMOUS_AUTHOR.to_string()),
            rating,
            title: non_empty(self.title),
            content: text(self.content).unwrap_or_default(),
            date: normalize_date_value(self.timestamp.as_ref(), parsed_at),
            source,
            helpful_count: parse_count(self.helpful.as_ref()),
            app_version: non_empty(self.app_version),
        })
    }
}

pub(crate) fn malformed(err: serde_json::Error) -> NormalizeError {
    NormalizeError::Malformed(err.to_string())
}

/// Member `key` of a nested object such as `author` or `consumer`.
pub(crate) fn member(value: Option<Value>, key: &str) -> Option<Value> {
    value.and_then(|mut object| object.get_mut(key).map(Value::take))
}

/// Strings as-is, numbers and booleans in their JSON spelling.
fn text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn non_empty(value: Option<Value>) -> Option<String> {
    text(value)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.trim().to_string()).filter(|text| !text.is_empty()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Upstream ratings arrive as integers, floats or numeric strings.
/// Anything unusable maps to 0, which is never a valid rating.
pub fn parse_rating(value: Option<&Value>) -> u8 {
    let parsed = match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(rating) if rating.fract() == 0.0 && (0.0..=255.0).contains(&rating) => rating as u8,
        _ => 0,
    }
}

fn parse_count(value: Option<&Value>) -> Option<u32> {
    match value? {
        Value::Number(number) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Canonical textual form of a timestamp.
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse the timestamp shapes seen across the platforms.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|midnight| midnight.and_utc());
    }
    raw.parse::<i64>().ok().and_then(from_epoch)
}

fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    // Millisecond timestamps are 13 digits for any date after 2001.
    if value.abs() >= 100_000_000_000 {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    }
}

fn normalize_date_value(value: Option<&Value>, parsed_at: DateTime<Utc>) -> String {
    let parsed = match value {
        None | Some(Value::Null) => return format_timestamp(parsed_at),
        Some(Value::String(text)) if text.trim().is_empty() => {
            return format_timestamp(parsed_at)
        }
        Some(Value::String(text)) => parse_timestamp(text),
        Some(Value::Number(number)) => number.as_i64().and_then(from_epoch),
        Some(_) => None,
    };

    match (parsed, value) {
        (Some(timestamp), _) => format_timestamp(timestamp),
        (None, Some(Value::String(text))) => {
            warn!("Keeping unrecognized review timestamp '{text}' verbatim");
            text.trim().to_string()
        }
        (None, Some(other)) => {
            warn!("Keeping unrecognized review timestamp {other} verbatim");
            other.to_string()
        }
        (None, None) => format_timestamp(parsed_at),
    }
}
