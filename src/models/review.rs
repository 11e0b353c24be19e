//! Canonical review record shared by every platform.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Upstream review platform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Google,
    Apple,
    Trustpilot,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Google, Source::Apple, Source::Trustpilot];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Google => "google",
            Source::Apple => "apple",
            Source::Trustpilot => "trustpilot",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Source::Google),
            "apple" => Ok(Source::Apple),
            "trustpilot" => Ok(Source::Trustpilot),
            other => Err(format!("unknown review source '{other}'")),
        }
    }
}

/// Author name used when the upstream omits one.
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

/// A single review, normalized from whichever platform it came from.
///
/// `date` is kept as text: normalized records carry an RFC 3339 UTC timestamp
/// (`2024-05-01T12:00:00Z`), so string order matches chronological order.
/// Timestamps the normalizer could not understand are carried verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub author: String,
    pub rating: u8,
    pub title: Option<String>,
    pub content: String,
    pub date: String,
    pub source: Source,
    pub helpful_count: Option<u32>,
    pub app_version: Option<String>,
}

impl Review {
    /// Identity of the review across all platforms.
    pub fn key(&self) -> (Source, &str) {
        (self.source, self.id.as_str())
    }
}
