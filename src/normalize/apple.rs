use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::{malformed, member, RecordFields, RecordNormalizer};
use crate::{
    error::NormalizeError,
    models::{Review, Source},
};

#[derive(Debug, Deserialize)]
struct RawAppleReview {
    id: Option<Value>,
    author: Option<Value>,
    rating: Option<Value>,
    title: Option<Value>,
    content: Option<Value>,
    updated: Option<Value>,
    vote_count: Option<Value>,
    version: Option<Value>,
}

/// App Store records: nested `author.name`, `updated`, `vote_count`, and
/// ratings that frequently arrive as strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppleNormalizer;

impl RecordNormalizer for AppleNormalizer {
    fn source(&self) -> Source {
        Source::Apple
    }

    fn normalize_record(
        &self,
        raw: &Value,
        parsed_at: DateTime<Utc>,
    ) -> Result<Review, NormalizeError> {
        if !raw.is_object() {
            return Err(NormalizeError::NotAnObject);
        }
        let record: RawAppleReview = serde_json::from_value(raw.clone()).map_err(malformed)?;

        RecordFields {
            id: record.id,
            author: member(record.author, "name"),
            rating: record.rating,
            title: record.title,
            content: record.content,
            timestamp: record.updated,
            helpful: record.vote_count,
            app_version: record.version,
        }
        .into_review(Source::Apple, parsed_at)
    }
}
