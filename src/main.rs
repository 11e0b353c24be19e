use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use review_feed::{
    init_logging,
    models::Source,
    service::{refresh_loop, ReviewQuery, ReviewService},
    Settings,
};

#[derive(Parser, Debug)]
#[command(name = "review-feed")]
#[command(about = "Aggregate recent reviews from Google Play, the App Store and Trustpilot")]
struct Cli {
    /// JSON settings file; missing files fall back to defaults
    #[arg(long, env = "REVIEW_FEED_CONFIG", default_value = "review-feed.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch reviews once and print them as JSON
    Fetch {
        #[command(flatten)]
        query: QueryArgs,

        /// Bypass the cache entirely
        #[arg(long)]
        no_cache: bool,

        /// Ignore any cached entry but store the fresh result
        #[arg(long, conflicts_with = "no_cache")]
        refresh: bool,
    },
    /// Refresh the cache on an interval until interrupted
    Watch {
        #[command(flatten)]
        query: QueryArgs,

        /// Seconds between refreshes; defaults to the settings file
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Inspect or maintain the review cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Look-back window in hours
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=168))]
    hours: Option<u32>,

    /// Only one platform: google, apple or trustpilot
    #[arg(long)]
    source: Option<Source>,

    /// Upper bound on pages requested per platform
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=50))]
    max_pages: Option<u32>,
}

impl QueryArgs {
    fn to_query(&self, settings: &Settings) -> ReviewQuery {
        ReviewQuery {
            window_hours: self.hours.unwrap_or(settings.query.window_hours),
            source: self.source,
            page_budget: self.max_pages.unwrap_or(settings.query.page_budget),
            ..ReviewQuery::default()
        }
    }
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Print cache occupancy
    Stats,
    /// Remove one key (e.g. reviews_24h_apple) or everything
    Clear {
        #[arg(long)]
        key: Option<String>,
    },
    /// Remove expired entries and orphaned rows
    Sweep,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let settings = Settings::load(Some(&cli.config))?;
    let service = Arc::new(ReviewService::from_settings(&settings)?);

    match cli.command {
        Command::Fetch {
            query,
            no_cache,
            refresh,
        } => {
            let query = ReviewQuery {
                cached: !no_cache,
                force_refresh: refresh,
                ..query.to_query(&settings)
            };
            let response = service.get(&query).await?;
            print_json(&response)?;
        }
        Command::Watch {
            query,
            interval_secs,
        } => {
            let query = query.to_query(&settings);
            let interval =
                Duration::from_secs(interval_secs.unwrap_or(settings.refresh.interval_secs).max(1));
            let cancel_token = CancellationToken::new();

            info!(
                "Refreshing reviews for the last {}h every {}s",
                query.window_hours,
                interval.as_secs()
            );
            let worker = tokio::spawn(refresh_loop(
                service.clone(),
                query,
                interval,
                cancel_token.clone(),
            ));

            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for ctrl-c")?;
            cancel_token.cancel();
            worker.await.context("refresh loop panicked")?;
        }
        Command::Cache { action } => match action {
            CacheAction::Stats => print_json(&service.cache_stats().await?)?,
            CacheAction::Clear { key } => service.clear_cache(key.as_deref()).await?,
            CacheAction::Sweep => print_json(&service.sweep_expired_cache().await?)?,
        },
    }

    Ok(())
}
