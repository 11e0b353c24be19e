use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::{malformed, member, RecordFields, RecordNormalizer};
use crate::{
    error::NormalizeError,
    models::{Review, Source},
};

#[derive(Debug, Deserialize)]
struct RawTrustpilotReview {
    id: Option<Value>,
    consumer: Option<Value>,
    stars: Option<Value>,
    title: Option<Value>,
    text: Option<Value>,
    dates: Option<Value>,
    likes: Option<Value>,
}

/// Trustpilot records: `consumer.displayName`, `stars`, `dates.publishedDate`.
/// Trustpilot reviews are not tied to an app version.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrustpilotNormalizer;

impl RecordNormalizer for TrustpilotNormalizer {
    fn source(&self) -> Source {
        Source::Trustpilot
    }

    fn normalize_record(
        &self,
        raw: &Value,
        parsed_at: DateTime<Utc>,
    ) -> Result<Review, NormalizeError> {
        if !raw.is_object() {
            return Err(NormalizeError::NotAnObject);
        }
        let record: RawTrustpilotReview =
            serde_json::from_value(raw.clone()).map_err(malformed)?;

        RecordFields {
            id: record.id,
            author: member(record.consumer, "displayName"),
            rating: record.stars,
            title: record.title,
            content: record.text,
            timestamp: member(record.dates, "publishedDate"),
            helpful: record.likes,
            app_version: None,
        }
        .into_review(Source::Trustpilot, parsed_at)
    }
}
