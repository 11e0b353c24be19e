//! Request-level orchestration: cache check, aggregation, cache write.

mod refresher;

pub use refresher::refresh_loop;

use std::sync::Arc;

use anyhow::Result;
use chrono::Duration;
use log::{info, warn};

use crate::{
    aggregator::Aggregator,
    cache::{CacheOccupancy, CacheStore, SweepReport},
    error::ReviewError,
    models::{ReviewsResponse, Source},
    settings::Settings,
    sources::{default_fetchers, HttpPageClient},
};

/// Parameters of one review request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewQuery {
    pub window_hours: u32,
    /// Restrict to one platform; `None` means all of them.
    pub source: Option<Source>,
    /// Read from and write to the cache.
    pub cached: bool,
    /// Skip the cache read but still write the fresh result.
    pub force_refresh: bool,
    pub page_budget: u32,
}

impl Default for ReviewQuery {
    fn default() -> Self {
        Self {
            window_hours: 24,
            source: None,
            cached: true,
            force_refresh: false,
            page_budget: 20,
        }
    }
}

impl ReviewQuery {
    pub fn for_source(source: Source) -> Self {
        Self {
            source: Some(source),
            ..Self::default()
        }
    }

    fn reads_cache(&self) -> bool {
        self.cached && !self.force_refresh
    }

    fn writes_cache(&self) -> bool {
        self.cached || self.force_refresh
    }
}

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub cache_ttl: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::hours(24),
        }
    }
}

pub struct ReviewService {
    aggregator: Aggregator,
    cache: CacheStore,
    options: ServiceOptions,
}

impl ReviewService {
    pub fn new(aggregator: Aggregator, cache: CacheStore, options: ServiceOptions) -> Self {
        Self {
            aggregator,
            cache,
            options,
        }
    }

    /// Wire up the HTTP client, fetchers and cache described by `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = Arc::new(HttpPageClient::new(&settings.upstream)?);
        let aggregator = Aggregator::new(
            default_fetchers(client, &settings.upstream),
            settings.upstream.credential(),
        )
        .with_unparsable_dates(settings.query.unparsable_dates);
        let cache = CacheStore::open(&settings.cache.path);
        let options = ServiceOptions {
            cache_ttl: Duration::hours(i64::from(settings.cache.ttl_hours)),
        };

        Ok(Self::new(aggregator, cache, options))
    }

    pub async fn get(&self, query: &ReviewQuery) -> Result<ReviewsResponse, ReviewError> {
        if query.reads_cache() {
            if let Some(hit) = self.cache.lookup(query.window_hours, query.source).await {
                return Ok(ReviewsResponse {
                    reviews: hit.reviews,
                    stats: hit.entry.stats,
                    fetched_at: hit.entry.fetched_at,
                    time_range_hours: query.window_hours,
                    cached: true,
                    sources: Vec::new(),
                });
            }
        }

        let result = self
            .aggregator
            .aggregate(query.window_hours, query.source, query.page_budget)
            .await?;

        if query.writes_cache() {
            if let Err(err) = self
                .cache
                .store(
                    query.window_hours,
                    query.source,
                    &result.reviews,
                    &result.stats,
                    result.fetched_at,
                    self.options.cache_ttl,
                )
                .await
            {
                warn!("Failed to cache reviews for the last {}h: {err:#}", query.window_hours);
            }
        }

        Ok(ReviewsResponse {
            reviews: result.reviews,
            stats: result.stats,
            fetched_at: result.fetched_at,
            time_range_hours: query.window_hours,
            cached: false,
            sources: result.sources,
        })
    }

    pub async fn google(&self, window_hours: u32, cached: bool) -> Result<ReviewsResponse, ReviewError> {
        self.get_source(Source::Google, window_hours, cached).await
    }

    pub async fn apple(&self, window_hours: u32, cached: bool) -> Result<ReviewsResponse, ReviewError> {
        self.get_source(Source::Apple, window_hours, cached).await
    }

    pub async fn trustpilot(&self, window_hours: u32, cached: bool) -> Result<ReviewsResponse, ReviewError> {
        self.get_source(Source::Trustpilot, window_hours, cached).await
    }

    async fn get_source(
        &self,
        source: Source,
        window_hours: u32,
        cached: bool,
    ) -> Result<ReviewsResponse, ReviewError> {
        let query = ReviewQuery {
            window_hours,
            cached,
            ..ReviewQuery::for_source(source)
        };
        self.get(&query).await
    }

    pub async fn cache_stats(&self) -> Result<CacheOccupancy> {
        self.cache.stats().await
    }

    /// Drop one cache key, or every entry when `key` is `None`.
    pub async fn clear_cache(&self, key: Option<&str>) -> Result<()> {
        self.cache.clear(key).await
    }

    pub async fn sweep_expired_cache(&self) -> Result<SweepReport> {
        let report = self.cache.sweep_expired().await?;
        info!(
            "Cache sweep finished: {} entries, {} orphaned rows",
            report.entries_removed, report.orphan_rows_removed
        );
        Ok(report)
    }
}
