//! TTL cache of aggregated review sets, keyed by query.
//!
//! The store never blocks the request path: if the database cannot be
//! opened it runs disabled, where lookups miss and writes do nothing.

use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{debug, info, warn};

use crate::{
    db::Database,
    models::{Review, ReviewStats, Source},
};

pub use crate::db::models::{CacheEntry, CacheOccupancy, CachedReviews, SweepReport};

/// `reviews_{hours}h`, suffixed with `_{source}` for single-platform queries.
pub fn cache_key(window_hours: u32, source: Option<Source>) -> String {
    match source {
        Some(source) => format!("reviews_{window_hours}h_{source}"),
        None => format!("reviews_{window_hours}h"),
    }
}

/// Latest expiry that still fits the fixed-width stored form.
fn latest_expiry() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(9999, 12, 31)
        .and_then(|day| day.and_hms_opt(23, 59, 59))
        .map(|moment| moment.and_utc())
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn expiry(cached_at: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    let latest = latest_expiry();
    cached_at
        .checked_add_signed(ttl)
        .map_or(latest, |expires_at| expires_at.min(latest))
}

#[derive(Clone)]
pub struct CacheStore {
    db: Option<Database>,
}

impl CacheStore {
    /// Open (or create) the cache at `path`, falling back to a disabled store.
    pub fn open(path: &Path) -> Self {
        match Database::new(path.to_path_buf()) {
            Ok(db) => Self { db: Some(db) },
            Err(err) => {
                warn!(
                    "Review cache unavailable at {}, continuing without it: {err:#}",
                    path.display()
                );
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self { db: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.db.is_some()
    }

    /// Live entry for the query, if any. Read failures count as a miss.
    pub async fn lookup(&self, window_hours: u32, source: Option<Source>) -> Option<CachedReviews> {
        let db = self.db.as_ref()?;
        let key = cache_key(window_hours, source);

        match db.load_cache_entry(&key, Utc::now()).await {
            Ok(Some(cached)) => {
                debug!("Cache hit for {key} ({} reviews)", cached.reviews.len());
                Some(cached)
            }
            Ok(None) => {
                debug!("Cache miss for {key}");
                None
            }
            Err(err) => {
                warn!("Cache read for {key} failed: {err:#}");
                None
            }
        }
    }

    /// Replace the entry for the query; it stays valid for `ttl`.
    pub async fn store(
        &self,
        window_hours: u32,
        source: Option<Source>,
        reviews: &[Review],
        stats: &ReviewStats,
        fetched_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<()> {
        let Some(db) = &self.db else {
            return Ok(());
        };

        let cached_at = Utc::now();
        let entry = CacheEntry {
            cache_key: cache_key(window_hours, source),
            window_hours,
            source_filter: source,
            generation: uuid::Uuid::new_v4().to_string(),
            stats: stats.clone(),
            fetched_at,
            cached_at,
            expires_at: expiry(cached_at, ttl),
        };
        let key = entry.cache_key.clone();

        db.replace_cache_entry(entry, reviews.to_vec()).await?;
        debug!("Cached {} reviews under {key}", reviews.len());
        Ok(())
    }

    pub async fn sweep_expired(&self) -> Result<SweepReport> {
        let Some(db) = &self.db else {
            return Ok(SweepReport::default());
        };

        let report = db.delete_expired_cache_entries(Utc::now()).await?;
        if report.entries_removed > 0 || report.orphan_rows_removed > 0 {
            info!(
                "Swept {} expired cache entries and {} orphaned rows",
                report.entries_removed, report.orphan_rows_removed
            );
        }
        Ok(report)
    }

    pub async fn stats(&self) -> Result<CacheOccupancy> {
        match &self.db {
            Some(db) => db.cache_occupancy(Utc::now()).await,
            None => Ok(CacheOccupancy::default()),
        }
    }

    /// Remove one key, or everything when `key` is `None`.
    pub async fn clear(&self, key: Option<&str>) -> Result<()> {
        let Some(db) = &self.db else {
            return Ok(());
        };

        let removed = match key {
            Some(key) => db.delete_cache_entry(key).await?,
            None => db.delete_all_cache_entries().await?,
        };
        info!(
            "Cleared {removed} cache entr{} ({})",
            if removed == 1 { "y" } else { "ies" },
            key.unwrap_or("all keys")
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::testing::{hours_ago, review};
    use chrono::SubsecRound;
    use rusqlite::params;

    fn sample() -> Vec<Review> {
        vec![
            review("g1", Source::Google, 5, hours_ago(1)),
            Review {
                title: None,
                helpful_count: None,
                app_version: Some("5.12.0".into()),
                ..review("a1", Source::Apple, 2, hours_ago(2))
            },
            review("t1", Source::Trustpilot, 4, hours_ago(3)),
        ]
    }

    fn open_store(dir: &tempfile::TempDir) -> CacheStore {
        let store = CacheStore::open(&dir.path().join("cache.sqlite3"));
        assert!(store.is_enabled());
        store
    }

    #[test]
    fn keys_are_deterministic() {
        assert_eq!(cache_key(24, None), "reviews_24h");
        assert_eq!(cache_key(72, Some(Source::Trustpilot)), "reviews_72h_trustpilot");
    }

    #[tokio::test]
    async fn round_trip_preserves_order_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let reviews = sample();
        let stats = ReviewStats::compute(&reviews);
        // Stored timestamps keep microseconds.
        let fetched_at = Utc::now().trunc_subsecs(6);

        store
            .store(24, None, &reviews, &stats, fetched_at, Duration::hours(24))
            .await
            .unwrap();
        let cached = store.lookup(24, None).await.unwrap();

        assert_eq!(cached.reviews, reviews);
        assert_eq!(cached.entry.stats, stats);
        assert_eq!(cached.entry.fetched_at, fetched_at);
        assert_eq!(cached.entry.source_filter, None);
        assert!(store.lookup(24, Some(Source::Google)).await.is_none());
        assert!(store.lookup(48, None).await.is_none());
    }

    #[tokio::test]
    async fn entry_is_absent_once_ttl_elapses() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let reviews = sample();

        store
            .store(24, None, &reviews, &ReviewStats::compute(&reviews), Utc::now(), Duration::zero())
            .await
            .unwrap();

        assert!(store.lookup(24, None).await.is_none());
    }

    #[test]
    fn huge_ttl_is_clamped_to_last_storable_moment() {
        let now = Utc::now();
        assert_eq!(expiry(now, Duration::hours(1)), now + Duration::hours(1));
        assert_eq!(expiry(now, Duration::MAX), latest_expiry());
        assert_eq!(
            crate::db::helpers::format_datetime(latest_expiry()),
            "9999-12-31T23:59:59.000000Z"
        );
    }

    #[tokio::test]
    async fn very_long_ttl_still_stores_a_live_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let reviews = sample();

        store
            .store(
                24,
                None,
                &reviews,
                &ReviewStats::compute(&reviews),
                Utc::now(),
                Duration::hours(i64::from(u32::MAX)),
            )
            .await
            .unwrap();

        let cached = store.lookup(24, None).await.unwrap();
        assert_eq!(cached.entry.expires_at, latest_expiry());
    }

    #[tokio::test]
    async fn store_replaces_previous_generation() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let first = sample();
        let second = vec![review("g9", Source::Google, 1, hours_ago(1))];

        for reviews in [&first, &second] {
            store
                .store(
                    24,
                    Some(Source::Google),
                    reviews,
                    &ReviewStats::compute(reviews),
                    Utc::now(),
                    Duration::hours(1),
                )
                .await
                .unwrap();
        }

        let cached = store.lookup(24, Some(Source::Google)).await.unwrap();
        assert_eq!(cached.reviews, second);

        let rows: i64 = store
            .db
            .as_ref()
            .unwrap()
            .execute(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM cached_reviews", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn clearing_a_key_twice_matches_clearing_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let reviews = sample();
        let stats = ReviewStats::compute(&reviews);

        for hours in [24, 48] {
            store
                .store(hours, None, &reviews, &stats, Utc::now(), Duration::hours(1))
                .await
                .unwrap();
        }

        store.clear(Some("reviews_24h")).await.unwrap();
        let once = store.stats().await.unwrap();
        store.clear(Some("reviews_24h")).await.unwrap();
        let twice = store.stats().await.unwrap();

        assert_eq!(once, twice);
        assert_eq!(twice.cache_entries, 1);
        assert!(store.lookup(48, None).await.is_some());

        store.clear(None).await.unwrap();
        store.clear(None).await.unwrap();
        assert_eq!(store.stats().await.unwrap().cache_entries, 0);
    }

    #[tokio::test]
    async fn sweep_removes_expired_entries_and_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let reviews = sample();
        let stats = ReviewStats::compute(&reviews);

        store
            .store(24, None, &reviews, &stats, Utc::now(), Duration::zero())
            .await
            .unwrap();
        store
            .store(48, None, &reviews, &stats, Utc::now(), Duration::hours(1))
            .await
            .unwrap();
        store
            .db
            .as_ref()
            .unwrap()
            .execute(|conn| {
                conn.execute(
                    "INSERT INTO cached_reviews (generation, position, id, source, author, rating, content, date)
                     VALUES (?1, 0, 'x', 'google', 'someone', 3, '', ?2)",
                    params!["lost-generation", hours_ago(1)],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let report = store.sweep_expired().await.unwrap();

        assert_eq!(report.entries_removed, 1);
        assert_eq!(report.orphan_rows_removed, 1);
        assert!(store.lookup(48, None).await.is_some());
        assert_eq!(store.sweep_expired().await.unwrap(), SweepReport::default());
    }

    #[tokio::test]
    async fn occupancy_counts_live_and_expired_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let reviews = sample();
        let stats = ReviewStats::compute(&reviews);

        assert_eq!(store.stats().await.unwrap(), CacheOccupancy::default());

        store
            .store(24, None, &reviews, &stats, Utc::now(), Duration::zero())
            .await
            .unwrap();
        store
            .store(24, Some(Source::Apple), &reviews[1..2], &ReviewStats::compute(&reviews[1..2]), Utc::now(), Duration::hours(1))
            .await
            .unwrap();

        let occupancy = store.stats().await.unwrap();
        assert_eq!(occupancy.cache_entries, 2);
        assert_eq!(occupancy.valid_caches, 1);
        assert_eq!(occupancy.total_reviews, 4);
        assert!(occupancy.oldest_cache.unwrap() <= occupancy.newest_cache.unwrap());
    }

    #[tokio::test]
    async fn occupancy_counts_orphaned_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let reviews = vec![review("g1", Source::Google, 5, hours_ago(1))];

        store
            .store(24, None, &reviews, &ReviewStats::compute(&reviews), Utc::now(), Duration::hours(1))
            .await
            .unwrap();
        store
            .db
            .as_ref()
            .unwrap()
            .execute(|conn| {
                conn.execute(
                    "INSERT INTO cached_reviews (generation, position, id, source, author, rating, content, date)
                     VALUES ('lost-generation', 0, 'x', 'apple', 'someone', 3, '', ?1)",
                    params![hours_ago(1)],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(store.stats().await.unwrap().total_reviews, 2);

        store.sweep_expired().await.unwrap();
        assert_eq!(store.stats().await.unwrap().total_reviews, 1);
    }

    #[tokio::test]
    async fn unusable_path_degrades_to_passthrough() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let store = CacheStore::open(&blocker.join("cache.sqlite3"));
        assert!(!store.is_enabled());

        let reviews = sample();
        store
            .store(24, None, &reviews, &ReviewStats::compute(&reviews), Utc::now(), Duration::hours(1))
            .await
            .unwrap();
        assert!(store.lookup(24, None).await.is_none());
        store.clear(None).await.unwrap();
        assert_eq!(store.sweep_expired().await.unwrap(), SweepReport::default());
        assert_eq!(store.stats().await.unwrap(), CacheOccupancy::default());
    }
}
