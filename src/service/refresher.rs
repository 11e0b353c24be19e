use std::sync::Arc;

use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{ReviewQuery, ReviewService};
use crate::{log_error, log_info};

const ENABLE_LOGS: bool = true;

/// Keep the cache warm for `query` until `cancel_token` fires.
///
/// Every tick force-refreshes the query and then sweeps expired entries.
/// The first tick runs immediately.
pub async fn refresh_loop(
    service: Arc<ReviewService>,
    query: ReviewQuery,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    let query = ReviewQuery {
        cached: true,
        force_refresh: true,
        ..query
    };
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match service.get(&query).await {
                    Ok(response) => log_info!(
                        "refreshed {} reviews for the last {}h",
                        response.reviews.len(),
                        response.time_range_hours
                    ),
                    Err(err) => log_error!("refresh failed: {err}"),
                }
                if let Err(err) = service.sweep_expired_cache().await {
                    log_error!("cache sweep failed: {err:#}");
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("refresh loop shutting down");
                break;
            }
        }
    }
}
