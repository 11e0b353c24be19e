use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Review, ReviewStats, Source};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase", tag = "state", content = "cause")]
pub enum SourceStatus {
    Complete,
    Degraded(String),
}

/// How one platform fared during a fresh aggregation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceReport {
    pub source: Source,
    pub status: SourceStatus,
    /// Records the fetcher returned, before window filtering.
    pub fetched: usize,
}

impl SourceReport {
    pub fn is_degraded(&self) -> bool {
        matches!(self.status, SourceStatus::Degraded(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewsResponse {
    pub reviews: Vec<Review>,
    pub stats: ReviewStats,
    pub fetched_at: DateTime<Utc>,
    pub time_range_hours: u32,
    pub cached: bool,
    /// Empty when the response was served from the cache.
    #[serde(default)]
    pub sources: Vec<SourceReport>,
}
