use serde_json::Value;

use super::{Cursor, ParsedPage, Platform};
use crate::{
    models::Source,
    normalize::{GoogleNormalizer, RecordNormalizer},
};

const PAGE_SIZE: usize = 10;

/// Google Play: offset pagination, newest first.
#[derive(Debug, Clone)]
pub struct GooglePlatform {
    app_id: String,
    normalizer: GoogleNormalizer,
}

impl GooglePlatform {
    pub fn new(app_id: String) -> Self {
        Self {
            app_id,
            normalizer: GoogleNormalizer,
        }
    }
}

impl Platform for GooglePlatform {
    fn source(&self) -> Source {
        Source::Google
    }

    fn subject(&self) -> &str {
        &self.app_id
    }

    fn page_size(&self) -> usize {
        PAGE_SIZE
    }

    fn first_cursor(&self) -> Cursor {
        Cursor::Offset(0)
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
            Cursor::Offset(offset) => Some(Cursor::Offset(offset + PAGE_SIZE)),
            _ => None,
        }
    }
}
