pub mod response;
pub mod review;
pub mod stats;

pub use response::{ReviewsResponse, SourceReport, SourceStatus};
pub use review::{Review, Source, ANONYMOUS_AUTHOR};
pub use stats::ReviewStats;
