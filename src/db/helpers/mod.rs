use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::Source;

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} value {value} is out of range"))
}

/// Fixed-width UTC form, so stored timestamps compare correctly as text.
pub fn format_datetime(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_source(value: &str) -> Result<Source> {
    value.parse::<Source>().map_err(|err| anyhow!(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn stored_timestamps_sort_chronologically() {
        let whole = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let later = whole + chrono::Duration::microseconds(1);

        let (a, b) = (format_datetime(whole), format_datetime(later));
        assert_eq!(a, "2024-05-01T12:00:00.000000Z");
        assert!(a < b);
        assert_eq!(parse_datetime(&b, "later").unwrap(), later);
    }

    #[test]
    fn rejects_unknown_source_and_negative_counts() {
        assert!(parse_source("yelp").is_err());
        assert_eq!(parse_source("apple").unwrap(), Source::Apple);
        assert!(to_u64(-1, "total").is_err());
    }
}
