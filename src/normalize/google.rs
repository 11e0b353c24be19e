use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::{malformed, RecordFields, RecordNormalizer};
use crate::{
    error::NormalizeError,
    models::{Review, Source},
};

#[derive(Debug, Deserialize)]
struct RawGoogleReview {
    id: Option<Value>,
    reviewer: Option<Value>,
    rating: Option<Value>,
    title: Option<Value>,
    text: Option<Value>,
    datetime: Option<Value>,
    likes: Option<Value>,
    version: Option<Value>,
}

/// Google Play records: `reviewer`, `datetime`, `likes`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GoogleNormalizer;

impl RecordNormalizer for GoogleNormalizer {
    fn source(&self) -> Source {
        Source::Google
    }

    fn normalize_record(
        &self,
        raw: &Value,
        parsed_at: DateTime<Utc>,
    ) -> Result<Review, NormalizeError> {
        if !raw.is_object() {
            return Err(NormalizeError::NotAnObject);
        }
        let record: RawGoogleReview = serde_json::from_value(raw.clone()).map_err(malformed)?;

        RecordFields {
            id: record.id,
            author: record.reviewer,
            rating: record.rating,
            title: record.title,
            content: record.text,
            timestamp: record.datetime,
            helpful: record.likes,
            app_version: record.version,
        }
        .into_review(Source::Google, parsed_at)
    }
}
