//! Paginated retrieval from the upstream review platforms.
//!
//! A [`Platform`] describes how one upstream pages its data; [`PagedFetcher`]
//! drives any platform through a [`PageClient`] and exposes the result as a
//! [`ReviewFetcher`], which is what the aggregator consumes.

mod apple;
mod google;
mod http;
mod paged;
mod trustpilot;

#[cfg(test)]
pub(crate) mod testing;

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

pub use apple::ApplePlatform;
pub use google::GooglePlatform;
pub use http::HttpPageClient;
pub use paged::PagedFetcher;
pub use trustpilot::TrustpilotPlatform;

use crate::{
    error::FetchError,
    models::{Review, Source, SourceStatus},
    settings::UpstreamSettings,
};

/// Position of a page within an upstream's stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// First page of a token-paginated stream.
    Start,
    Offset(usize),
    Page(u32),
    Token(String),
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::Start => f.write_str("start"),
            Cursor::Offset(offset) => write!(f, "offset {offset}"),
            Cursor::Page(page) => write!(f, "page {page}"),
            Cursor::Token(token) => write!(f, "token {token}"),
        }
    }
}

/// One upstream page request.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub source: Source,
    /// App id or business domain the reviews belong to.
    pub subject: String,
    pub credential: String,
    pub cursor: Cursor,
}

/// Upstream page-fetch contract.
#[async_trait]
pub trait PageClient: Send + Sync {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Value, FetchError>;
}

/// A page after normalization.
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    pub reviews: Vec<Review>,
    /// Raw records on the page, including ones the normalizer dropped.
    pub raw_count: usize,
    /// Continuation token, for platforms that hand one out.
    pub continuation: Option<String>,
}

/// Per-platform pagination strategy.
pub trait Platform: Send + Sync + 'static {
    fn source(&self) -> Source;

    fn subject(&self) -> &str;

    /// Records on a full page; anything shorter ends the stream.
    fn page_size(&self) -> usize;

    fn first_cursor(&self) -> Cursor;

    fn parse_page(&self, payload: &Value) -> ParsedPage;

    /// Cursor for the page after `current`, or `None` when the platform
    /// signals there is nothing more to read.
    fn next_cursor(&self, current: &Cursor, page: &ParsedPage) -> Option<Cursor>;
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Oldest review of interest; pagination stops once a page reaches past it.
    pub since: DateTime<Utc>,
    pub page_budget: u32,
    pub credential: String,
}

/// Result of one fetch call.
///
/// `Degraded` keeps whatever was read before the failure, so an empty
/// `Degraded` (upstream down) stays distinguishable from an empty `Complete`
/// (nothing new upstream).
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Complete(Vec<Review>),
    Degraded {
        partial: Vec<Review>,
        cause: FetchError,
    },
}

impl FetchOutcome {
    pub fn reviews(&self) -> &[Review] {
        match self {
            FetchOutcome::Complete(reviews) => reviews,
            FetchOutcome::Degraded { partial, .. } => partial,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, FetchOutcome::Degraded { .. })
    }

    pub fn into_parts(self) -> (Vec<Review>, SourceStatus) {
        match self {
            FetchOutcome::Complete(reviews) => (reviews, SourceStatus::Complete),
            FetchOutcome::Degraded { partial, cause } => {
                (partial, SourceStatus::Degraded(cause.to_string()))
            }
        }
    }
}

#[async_trait]
pub trait ReviewFetcher: Send + Sync {
    fn source(&self) -> Source;

    async fn fetch(&self, request: &FetchRequest) -> FetchOutcome;
}

/// One fetcher per platform, all sharing `client`.
pub fn default_fetchers(
    client: Arc<dyn PageClient>,
    settings: &UpstreamSettings,
) -> Vec<Arc<dyn ReviewFetcher>> {
    let timeout = Duration::from_secs(settings.request_timeout_secs);

    vec![
        Arc::new(PagedFetcher::new(
            GooglePlatform::new(settings.google_app_id.clone()),
            client.clone(),
            timeout,
        )),
        Arc::new(PagedFetcher::new(
            ApplePlatform::new(settings.apple_app_id.clone()),
            client.clone(),
            timeout,
        )),
        Arc::new(PagedFetcher::new(
            TrustpilotPlatform::new(settings.trustpilot_domain.clone()),
            client,
            timeout,
        )),
    ]
}
