//! In-memory stand-ins for the upstream platforms.

use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{json, Value};

use super::{Cursor, FetchOutcome, FetchRequest, PageClient, PageRequest, ReviewFetcher};
use crate::{
    error::FetchError,
    models::{Review, Source},
    normalize::format_timestamp,
};

/// Serves queued pages per source; an exhausted queue answers with an empty page.
#[derive(Default)]
pub struct ScriptedClient {
    pages: Mutex<HashMap<Source, VecDeque<Result<Value, FetchError>>>>,
    requests: Mutex<Vec<PageRequest>>,
    delay: Option<Duration>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, source: Source, payload: Value) -> Self {
        self.push(source, Ok(payload))
    }

    pub fn failure(self, source: Source, err: FetchError) -> Self {
        self.push(source, Err(err))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn push(self, source: Source, item: Result<Value, FetchError>) -> Self {
        self.pages
            .lock()
            .unwrap()
            .entry(source)
            .or_default()
            .push_back(item);
        self
    }

    pub fn request_count(&self, source: Source) -> usize {
        self.cursors(source).len()
    }

    pub fn cursors(&self, source: Source) -> Vec<Cursor> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.source == source)
            .map(|request| request.cursor.clone())
            .collect()
    }

    pub fn total_requests(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl PageClient for ScriptedClient {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Value, FetchError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self
            .pages
            .lock()
            .unwrap()
            .get_mut(&request.source)
            .and_then(VecDeque::pop_front);
        next.unwrap_or_else(|| Ok(json!({ "reviews": [] })))
    }
}

/// Fetcher that always returns the same outcome.
pub struct StaticFetcher {
    pub source: Source,
    pub outcome: FetchOutcome,
}

#[async_trait]
impl ReviewFetcher for StaticFetcher {
    fn source(&self) -> Source {
        self.source
    }

    async fn fetch(&self, _request: &FetchRequest) -> FetchOutcome {
        self.outcome.clone()
    }
}

pub fn hours_ago(hours: i64) -> String {
    format_timestamp(Utc::now() - ChronoDuration::hours(hours))
}

pub fn review(id: &str, source: Source, rating: u8, date: String) -> Review {
    Review {
        id: id.to_string(),
        author: format!("author of {id}"),
        rating,
        title: Some(format!("title {id}")),
        content: format!("content {id}"),
        date,
        source,
        helpful_count: Some(1),
        app_version: None,
    }
}

pub fn google_page(ids: &[String], age_hours: i64) -> Value {
    let reviews: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "reviewer": "Play user",
                "rating": 4,
                "text": "fine",
                "datetime": hours_ago(age_hours),
                "likes": 2,
                "version": "5.12.0"
            })
        })
        .collect();
    json!({ "reviews": reviews })
}

pub fn apple_page(ids: &[String], age_hours: i64) -> Value {
    let reviews: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "author": {"name": "Store user"},
                "rating": "5",
                "title": "great",
                "content": "great app",
                "updated": hours_ago(age_hours),
                "version": "5.11.2"
            })
        })
        .collect();
    json!({ "reviews": reviews })
}

pub fn trustpilot_page(ids: &[String], age_hours: i64, next: Option<&str>) -> Value {
    let reviews: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "consumer": {"displayName": "Visitor"},
                "stars": 3,
                "title": "ok",
                "text": "average experience",
                "dates": {"publishedDate": hours_ago(age_hours)}
            })
        })
        .collect();
    match next {
        Some(token) => json!({ "reviews": reviews, "nextPageToken": token }),
        None => json!({ "reviews": reviews }),
    }
}
