//! Rows of the review cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Review, ReviewStats, Source};

/// One cached aggregation, minus its reviews.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub cache_key: String,
    pub window_hours: u32,
    pub source_filter: Option<Source>,
    /// Names the review rows written together with this entry.
    pub generation: String,
    pub stats: ReviewStats,
    pub fetched_at: DateTime<Utc>,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// A live cache entry with its reviews in served order.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedReviews {
    pub entry: CacheEntry,
    pub reviews: Vec<Review>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CacheOccupancy {
    pub cache_entries: u64,
    /// Stored review rows, including ones no entry refers to any more.
    pub total_reviews: u64,
    pub oldest_cache: Option<DateTime<Utc>>,
    pub newest_cache: Option<DateTime<Utc>>,
    pub valid_caches: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SweepReport {
    pub entries_removed: u64,
    pub orphan_rows_removed: u64,
}
