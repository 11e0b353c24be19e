use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::Value;

use super::{Cursor, PageClient, PageRequest};
use crate::{error::FetchError, models::Source, settings::UpstreamSettings};

/// Page client for the review-extraction API: one
/// `GET {base_url}/reviews/{platform}` per page, authorized with a bearer key.
#[derive(Debug, Clone)]
pub struct HttpPageClient {
    client: Client,
    base_url: String,
}

impl HttpPageClient {
    pub fn new(settings: &UpstreamSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .user_agent(concat!("review-feed/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build http client")?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, source: Source) -> String {
        let platform = match source {
            Source::Google => "googleplay",
            Source::Apple => "appstore",
            Source::Trustpilot => "trustpilot",
        };
        format!("{}/reviews/{platform}", self.base_url)
    }
}

fn query_params(request: &PageRequest) -> Vec<(&'static str, String)> {
    let mut params = vec![("id", request.subject.clone())];
    match &request.cursor {
        Cursor::Start => {}
        Cursor::Offset(offset) => params.push(("offset", offset.to_string())),
        Cursor::Page(page) => params.push(("page", page.to_string())),
        Cursor::Token(token) => params.push(("page_token", token.clone())),
    }
    params
}

#[async_trait]
impl PageClient for HttpPageClient {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Value, FetchError> {
        let url = self.endpoint(request.source);
        debug!("GET {url} ({})", request.cursor);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&request.credential)
            .query(&query_params(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response
            .json::<Value>()
            .await
            .map_err(|err| FetchError::Decode(err.to_string()))
    }
}
