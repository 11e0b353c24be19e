use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};

use crate::aggregator::UnparsableDatePolicy;

pub const API_KEY_ENV: &str = "REVIEW_FEED_API_KEY";
const LEGACY_API_KEY_ENV: &str = "WEXTRACTOR_API_KEY";
const API_URL_ENV: &str = "REVIEW_FEED_API_URL";
const CACHE_PATH_ENV: &str = "REVIEW_FEED_CACHE_PATH";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub google_app_id: String,
    pub apple_app_id: String,
    pub trustpilot_domain: String,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.wextractor.com/v1".into(),
            api_key: None,
            request_timeout_secs: 30,
            google_app_id: "com.preply.android".into(),
            apple_app_id: "1400521332".into(),
            trustpilot_domain: "preply.com".into(),
        }
    }
}

impl UpstreamSettings {
    /// The configured key, ignoring blank values.
    pub fn credential(&self) -> Option<String> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub path: PathBuf,
    pub ttl_hours: u32,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/reviews_cache.sqlite3"),
            ttl_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    pub window_hours: u32,
    pub page_budget: u32,
    pub unparsable_dates: UnparsableDatePolicy,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            window_hours: 24,
            page_budget: 20,
            unparsable_dates: UnparsableDatePolicy::Keep,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    pub interval_secs: u64,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            interval_secs: 15 * 60,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub upstream: UpstreamSettings,
    pub cache: CacheSettings,
    pub query: QuerySettings,
    pub refresh: RefreshSettings,
}

impl Settings {
    /// Read settings from `path` when it exists, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            _ => Self::default(),
        };
        settings.apply_overrides(|name| std::env::var(name).ok());
        Ok(settings)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(key) = non_blank(API_KEY_ENV).or_else(|| non_blank(LEGACY_API_KEY_ENV)) {
            self.upstream.api_key = Some(key);
        }
        if let Some(url) = non_blank(API_URL_ENV) {
            self.upstream.base_url = url;
        }
        if let Some(path) = non_blank(CACHE_PATH_ENV) {
            self.cache.path = PathBuf::from(path);
        }
    }
}
