use std::time::Duration;

use thiserror::Error;

/// Failures surfaced to callers of the review service.
///
/// Upstream outages, malformed records and cache problems are absorbed
/// internally; only configuration problems reach the caller.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("no upstream API key configured; set {0}")]
    MissingCredential(&'static str),
}

/// Why a single page request failed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("upstream answered with status {0}")]
    Status(u16),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("could not decode page: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Why a raw upstream record was dropped.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum NormalizeError {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("record has no id")]
    MissingId,
    #[error("record {id} has invalid rating {raw}")]
    InvalidRating { id: String, raw: String },
    #[error("record does not match the expected shape: {0}")]
    Malformed(String),
}
