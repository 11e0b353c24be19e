//! Merges the platform fetchers into one windowed, sorted feed.

use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    error::ReviewError,
    models::{Review, ReviewStats, Source, SourceReport},
    normalize::parse_timestamp,
    settings::API_KEY_ENV,
    sources::{FetchRequest, ReviewFetcher},
};

/// What to do with a review whose `date` cannot be parsed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnparsableDatePolicy {
    /// Include the review in every window.
    #[default]
    Keep,
    Drop,
}

#[derive(Debug, Clone)]
pub struct AggregateResult {
    pub reviews: Vec<Review>,
    pub stats: ReviewStats,
    pub fetched_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
}

pub struct Aggregator {
    fetchers: Vec<Arc<dyn ReviewFetcher>>,
    credential: Option<String>,
    unparsable_dates: UnparsableDatePolicy,
}

impl Aggregator {
    pub fn new(fetchers: Vec<Arc<dyn ReviewFetcher>>, credential: Option<String>) -> Self {
        Self {
            fetchers,
            credential,
            unparsable_dates: UnparsableDatePolicy::default(),
        }
    }

    pub fn with_unparsable_dates(mut self, policy: UnparsableDatePolicy) -> Self {
        self.unparsable_dates = policy;
        self
    }

    /// Fetch every applicable platform concurrently and merge the results.
    ///
    /// Upstream failures only shrink the result; the one error is a missing
    /// credential, since nothing can be fetched without it.
    pub async fn aggregate(
        &self,
        window_hours: u32,
        source: Option<Source>,
        page_budget: u32,
    ) -> Result<AggregateResult, ReviewError> {
        let credential = self
            .credential
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ReviewError::MissingCredential(API_KEY_ENV))?;

        let since = Utc::now() - Duration::hours(i64::from(window_hours));
        let request = FetchRequest {
            since,
            page_budget,
            credential,
        };

        let selected = self
            .fetchers
            .iter()
            .filter(|fetcher| source.map_or(true, |wanted| fetcher.source() == wanted));
        let outcomes = join_all(selected.map(|fetcher| {
            let request = &request;
            async move { (fetcher.source(), fetcher.fetch(request).await) }
        }))
        .await;
        let fetched_at = Utc::now();

        let mut merged = Vec::new();
        let mut reports = Vec::with_capacity(outcomes.len());
        for (source, outcome) in outcomes {
            let (reviews, status) = outcome.into_parts();
            reports.push(SourceReport {
                source,
                status,
                fetched: reviews.len(),
            });
            merged.extend(reviews);
        }

        let mut reviews = within_window(dedup(merged), since, self.unparsable_dates);
        sort_newest_first(&mut reviews);
        let stats = ReviewStats::compute(&reviews);

        let degraded = reports.iter().filter(|report| report.is_degraded()).count();
        info!(
            "Aggregated {} reviews for the last {window_hours}h ({degraded} degraded source(s))",
            reviews.len()
        );

        Ok(AggregateResult {
            reviews,
            stats,
            fetched_at,
            sources: reports,
        })
    }
}

fn dedup(reviews: Vec<Review>) -> Vec<Review> {
    let mut seen = HashSet::new();
    reviews
        .into_iter()
        .filter(|review| seen.insert((review.source, review.id.clone())))
        .collect()
}

fn within_window(
    reviews: Vec<Review>,
    since: DateTime<Utc>,
    policy: UnparsableDatePolicy,
) -> Vec<Review> {
    let mut unparsable = 0usize;
    let kept: Vec<Review> = reviews
        .into_iter()
        .filter(|review| match parse_timestamp(&review.date) {
            Some(date) => date >= since,
            None => {
                unparsable += 1;
                policy == UnparsableDatePolicy::Keep
            }
        })
        .collect();

    if unparsable > 0 {
        let action = match policy {
            UnparsableDatePolicy::Keep => "kept",
            UnparsableDatePolicy::Drop => "dropped",
        };
        warn!("{unparsable} review(s) with unparsable dates {action}");
    }
    kept
}

/// Newest first. Normalized dates compare correctly as strings.
fn sort_newest_first(reviews: &mut [Review]) {
    reviews.sort_by(|a, b| b.date.cmp(&a.date));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::FetchError,
        models::SourceStatus,
        settings::UpstreamSettings,
        sources::{
            default_fetchers,
            testing::{google_page, hours_ago, review, ScriptedClient, StaticFetcher},
            FetchOutcome,
        },
    };

    fn fetcher(source: Source, outcome: FetchOutcome) -> Arc<dyn ReviewFetcher> {
        Arc::new(StaticFetcher { source, outcome })
    }

    fn reviews(prefix: &str, source: Source, count: usize) -> Vec<Review> {
        (0..count)
            .map(|n| review(&format!("{prefix}{n}"), source, (n % 5 + 1) as u8, hours_ago(n as i64 + 1)))
            .collect()
    }

    #[tokio::test]
    async fn merges_sources_and_tolerates_one_down() {
        let aggregator = Aggregator::new(
            vec![
                fetcher(Source::Google, FetchOutcome::Complete(reviews("g", Source::Google, 5))),
                fetcher(Source::Apple, FetchOutcome::Complete(reviews("a", Source::Apple, 3))),
                fetcher(
                    Source::Trustpilot,
                    FetchOutcome::Degraded {
                        partial: Vec::new(),
                        cause: FetchError::Status(503),
                    },
                ),
            ],
            Some("key".into()),
        );

        let result = aggregator.aggregate(24, None, 20).await.unwrap();

        assert_eq!(result.reviews.len(), 8);
        assert_eq!(result.stats.total_reviews, 8);
        assert_eq!(result.stats.google_reviews, 5);
        assert_eq!(result.stats.apple_reviews, 3);
        assert_eq!(result.stats.trustpilot_reviews, 0);
        assert_eq!(result.stats.rating_distribution.values().sum::<u32>(), 8);

        let trustpilot = result
            .sources
            .iter()
            .find(|report| report.source == Source::Trustpilot)
            .unwrap();
        assert_eq!(
            trustpilot.status,
            SourceStatus::Degraded("upstream answered with status 503".into())
        );
        assert_eq!(trustpilot.fetched, 0);
    }

    #[tokio::test]
    async fn window_excludes_older_reviews() {
        let aggregator = Aggregator::new(
            vec![fetcher(
                Source::Google,
                FetchOutcome::Complete(vec![
                    review("old", Source::Google, 3, hours_ago(25)),
                    review("recent", Source::Google, 4, hours_ago(23)),
                ]),
            )],
            Some("key".into()),
        );

        let result = aggregator.aggregate(24, None, 20).await.unwrap();

        let ids: Vec<&str> = result.reviews.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["recent"]);
        // The report counts what the fetcher returned, before filtering.
        assert_eq!(result.sources[0].fetched, 2);
    }

    #[tokio::test]
    async fn output_is_sorted_newest_first_across_sources() {
        let aggregator = Aggregator::new(
            vec![
                fetcher(Source::Google, FetchOutcome::Complete(reviews("g", Source::Google, 4))),
                fetcher(Source::Apple, FetchOutcome::Complete(reviews("a", Source::Apple, 4))),
                fetcher(
                    Source::Trustpilot,
                    FetchOutcome::Complete(reviews("t", Source::Trustpilot, 4)),
                ),
            ],
            Some("key".into()),
        );

        let result = aggregator.aggregate(48, None, 20).await.unwrap();

        assert_eq!(result.reviews.len(), 12);
        assert!(result
            .reviews
            .windows(2)
            .all(|pair| pair[0].date >= pair[1].date));
    }

    #[tokio::test]
    async fn unparsable_dates_follow_policy() {
        let outcome = FetchOutcome::Complete(vec![
            review("weird", Source::Apple, 2, "sometime last week".into()),
            review("fine", Source::Apple, 5, hours_ago(1)),
        ]);

        let keep = Aggregator::new(vec![fetcher(Source::Apple, outcome.clone())], Some("k".into()));
        let kept = keep.aggregate(24, None, 20).await.unwrap();
        assert_eq!(kept.reviews.len(), 2);

        let drop = Aggregator::new(vec![fetcher(Source::Apple, outcome)], Some("k".into()))
            .with_unparsable_dates(UnparsableDatePolicy::Drop);
        let dropped = drop.aggregate(24, None, 20).await.unwrap();
        assert_eq!(dropped.reviews.len(), 1);
        assert_eq!(dropped.reviews[0].id, "fine");
    }

    #[tokio::test]
    async fn all_sources_down_yields_empty_result() {
        let down = || FetchOutcome::Degraded {
            partial: Vec::new(),
            cause: FetchError::Transport("dns".into()),
        };
        let aggregator = Aggregator::new(
            vec![
                fetcher(Source::Google, down()),
                fetcher(Source::Apple, down()),
                fetcher(Source::Trustpilot, down()),
            ],
            Some("key".into()),
        );

        let result = aggregator.aggregate(24, None, 20).await.unwrap();

        assert!(result.reviews.is_empty());
        assert_eq!(result.stats, ReviewStats::default());
        assert!(result.sources.iter().all(SourceReport::is_degraded));
    }

    #[tokio::test]
    async fn missing_credential_is_fatal() {
        let aggregator = Aggregator::new(
            vec![fetcher(Source::Google, FetchOutcome::Complete(Vec::new()))],
            Some("  ".into()),
        );

        let err = aggregator.aggregate(24, None, 20).await.unwrap_err();
        assert!(matches!(err, ReviewError::MissingCredential(API_KEY_ENV)));
    }

    #[tokio::test]
    async fn source_filter_only_queries_that_platform() {
        let client = Arc::new(ScriptedClient::new().page(
            Source::Google,
            google_page(&["g1".to_string(), "g2".to_string()], 2),
        ));
        let aggregator = Aggregator::new(
            default_fetchers(client.clone(), &UpstreamSettings::default()),
            Some("key".into()),
        );

        let result = aggregator
            .aggregate(24, Some(Source::Google), 20)
            .await
            .unwrap();

        assert_eq!(result.reviews.len(), 2);
        assert_eq!(result.sources.len(), 1);
        assert_eq!(client.total_requests(), 1);
        assert_eq!(client.request_count(Source::Google), 1);
    }

    #[test]
    fn same_id_on_different_sources_is_not_a_duplicate() {
        let date = hours_ago(1);
        let merged = dedup(vec![
            review("1", Source::Google, 5, date.clone()),
            review("1", Source::Apple, 5, date.clone()),
            review("1", Source::Google, 4, date),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].rating, 5);
    }
}
