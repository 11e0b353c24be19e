use serde_json::Value;

use super::{Cursor, ParsedPage, Platform};
use crate::{
    models::Source,
    normalize::{RecordNormalizer, TrustpilotNormalizer},
};

const PAGE_SIZE: usize = 20;

/// Trustpilot: opaque `nextPageToken` continuation.
#[derive(Debug, Clone)]
pub struct TrustpilotPlatform {
    domain: String,
    normalizer: TrustpilotNormalizer,
}

impl TrustpilotPlatform {
    pub fn new(domain: String) -> Self {
        Self {
            domain,
            normalizer: TrustpilotNormalizer,
        }
    }
}

fn continuation_token(payload: &Value) -> Option<String> {
    payload
        .get("nextPageToken")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

impl Platform for TrustpilotPlatform {
    fn source(&self) -> Source {
        Source::Trustpilot
    }

    fn subject(&self) -> &str {
        &self.domain
    }

    fn page_size(&self) -> usize {
        PAGE_SIZE
    }

    fn first_cursor(&self) -> Cursor {
        Cursor::Start
    }

    fn parse_page(&self, payload: &Value) -> ParsedPage {
        let page = self.normalizer.normalize_page(payload);
        ParsedPage {
            reviews: page.reviews,
            raw_count: page.raw_count,
            continuation: continuation_token(payload),
        }
    }

    fn next_cursor(&self, _current: &Cursor, page: &ParsedPage) -> Option<Cursor> {
        page.continuation.clone().map(Cursor::Token)
    }
}
