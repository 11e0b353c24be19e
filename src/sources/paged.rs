use std::{collections::HashSet, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{Cursor, FetchOutcome, FetchRequest, PageClient, PageRequest, Platform, ReviewFetcher};
use crate::{
    error::FetchError,
    models::{Review, Source},
    normalize::parse_timestamp,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_info, log_warn};

/// Drives a [`Platform`] page by page until the stream ends, the freshness
/// boundary is crossed, or the page budget runs out.
pub struct PagedFetcher<P: Platform> {
    platform: P,
    client: Arc<dyn PageClient>,
    page_timeout: Duration,
}

impl<P: Platform> PagedFetcher<P> {
    pub fn new(platform: P, client: Arc<dyn PageClient>, page_timeout: Duration) -> Self {
        Self {
            platform,
            client,
            page_timeout,
        }
    }

    async fn request_page(&self, request: &PageRequest) -> Result<serde_json::Value, FetchError> {
        match tokio::time::timeout(self.page_timeout, self.client.fetch_page(request)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.page_timeout)),
        }
    }

    fn degraded(&self, partial: Vec<Review>, cause: FetchError, pages: u32) -> FetchOutcome {
        log_warn!(
            "{} fetch stopped at page {}: {cause}; keeping {} reviews",
            self.platform.source(),
            pages + 1,
            partial.len()
        );
        FetchOutcome::Degraded { partial, cause }
    }
}

fn older_than(review: &Review, since: DateTime<Utc>) -> bool {
    parse_timestamp(&review.date).is_some_and(|date| date < since)
}

#[async_trait]
impl<P: Platform> ReviewFetcher for PagedFetcher<P> {
    fn source(&self) -> Source {
        self.platform.source()
    }

    async fn fetch(&self, request: &FetchRequest) -> FetchOutcome {
        let source = self.platform.source();
        let mut seen: HashSet<String> = HashSet::new();
        let mut reviews = Vec::new();
        let mut cursor = self.platform.first_cursor();
        let mut pages: u32 = 0;
        let mut duplicates = 0usize;

        while pages < request.page_budget {
            let page_request = PageRequest {
                source,
                subject: self.platform.subject().to_string(),
                credential: request.credential.clone(),
                cursor: cursor.clone(),
            };

            let payload = match self.request_page(&page_request).await {
                Ok(payload) => payload,
                Err(err) => return self.degraded(reviews, err, pages),
            };
            pages += 1;

            let page = self.platform.parse_page(&payload);
            let short_page = page.raw_count < self.platform.page_size();
            let crossed_boundary = page.reviews.iter().any(|r| older_than(r, request.since));
            let next = self.platform.next_cursor(&cursor, &page);

            for review in page.reviews {
                if seen.insert(review.id.clone()) {
                    reviews.push(review);
                } else {
                    duplicates += 1;
                }
            }

            if short_page || crossed_boundary {
                break;
            }
            match next {
                Some(next) => cursor = next,
                None => break,
            }
        }

        if pages >= request.page_budget && request.page_budget > 0 {
            log_info!("{source} page budget of {} reached", request.page_budget);
        }
        log_info!(
            "Fetched {} {source} reviews over {pages} page(s), {duplicates} duplicate(s) dropped",
            reviews.len()
        );

        FetchOutcome::Complete(reviews)
    }
}
