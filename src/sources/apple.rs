use serde_json::Value;

use super::{Cursor, ParsedPage, Platform};
use crate::{
    models::Source,
    normalize::{AppleNormalizer, RecordNormalizer},
};

const PAGE_SIZE: usize = 10;

/// The App Store review feed stops serving after this page.
const LAST_FEED_PAGE: u32 = 10;

/// App Store: numbered pages starting at 1, capped by the feed.
#[derive(Debug, Clone)]
pub struct ApplePlatform {
    app_id: String,
    normalizer: AppleNormalizer,
}

impl ApplePlatform {
    pub fn new(app_id: String) -> Self {
        Self {
            app_id,
            normalizer: AppleNormalizer,
        }
    }
}

impl Platform for ApplePlatform {
    fn source(&self) -> Source {
        Source::Apple
    }

    fn subject(&self) -> &str {
        &self.app_id
    }

    fn page_size(&self) -> usize {
        PAGE_SIZE
    }

    fn first_cursor(&self) -> Cursor {
        Cursor::Page(1)
    }

    fn parse_page(&self, payload: &Value) -> ParsedPage {
        let page = self.normalizer.normalize_page(payload);
        ParsedPage {
            reviews: page.reviews,
            raw_count: page.raw_count,
            continuation: None,
        }
    }

    fn next_cursor(&self, current: &Cursor, _page: &ParsedPage) -> Option<Cursor> {
        match current {
            Cursor::Page(page) if *page < LAST_FEED_PAGE => Some(Cursor::Page(page + 1)),
            _ => None,
        }
    }
}
