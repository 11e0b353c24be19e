//! Aggregates app and business reviews from Google Play, the App Store and
//! Trustpilot into one time-windowed feed, cached in SQLite.

pub mod aggregator;
pub mod cache;
mod db;
pub mod error;
pub mod models;
pub mod normalize;
pub mod service;
pub mod settings;
pub mod sources;
mod utils;

pub use aggregator::{AggregateResult, Aggregator, UnparsableDatePolicy};
pub use cache::CacheStore;
pub use error::{FetchError, NormalizeError, ReviewError};
pub use models::{Review, ReviewStats, ReviewsResponse, Source};
pub use service::{ReviewQuery, ReviewService, ServiceOptions};
pub use settings::Settings;

/// Route `log` output to stderr. Honors `RUST_LOG`, defaulting to `info`.
pub fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
