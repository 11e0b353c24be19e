use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::{
    db::{
        helpers::{
            format_datetime, parse_datetime, parse_optional_datetime, parse_source, to_i64,
            to_u32, to_u64,
        },
        models::{CacheEntry, CacheOccupancy, CachedReviews, SweepReport},
        Database,
    },
    models::{Review, ReviewStats},
};

const ENTRY_COLUMNS: &str = "cache_key, window_hours, source_filter, generation, total_reviews,
    average_rating, rating_distribution, google_count, apple_count, trustpilot_count,
    fetched_at, cached_at, expires_at";

fn row_to_entry(row: &Row) -> Result<CacheEntry> {
    let window_hours: i64 = row.get("window_hours")?;
    let source_filter: Option<String> = row.get("source_filter")?;
    let total_reviews: i64 = row.get("total_reviews")?;
    let distribution: String = row.get("rating_distribution")?;
    let google_count: i64 = row.get("google_count")?;
    let apple_count: i64 = row.get("apple_count")?;
    let trustpilot_count: i64 = row.get("trustpilot_count")?;
    let fetched_at: String = row.get("fetched_at")?;
    let cached_at: String = row.get("cached_at")?;
    let expires_at: String = row.get("expires_at")?;

    let rating_distribution: BTreeMap<u8, u32> = serde_json::from_str(&distribution)
        .context("failed to parse rating_distribution")?;

    Ok(CacheEntry {
        cache_key: row.get("cache_key")?,
        window_hours: to_u32(window_hours, "window_hours")?,
        source_filter: source_filter.as_deref().map(parse_source).transpose()?,
        generation: row.get("generation")?,
        stats: ReviewStats {
            total_reviews: to_u32(total_reviews, "total_reviews")?,
            average_rating: row.get("average_rating")?,
            rating_distribution,
            google_reviews: to_u32(google_count, "google_count")?,
            apple_reviews: to_u32(apple_count, "apple_count")?,
            trustpilot_reviews: to_u32(trustpilot_count, "trustpilot_count")?,
        },
        fetched_at: parse_datetime(&fetched_at, "fetched_at")?,
        cached_at: parse_datetime(&cached_at, "cached_at")?,
        expires_at: parse_datetime(&expires_at, "expires_at")?,
    })
}

fn row_to_review(row: &Row) -> Result<Review> {
    let source: String = row.get("source")?;
    let rating: i64 = row.get("rating")?;
    let helpful_count: Option<i64> = row.get("helpful_count")?;

    Ok(Review {
        id: row.get("id")?,
        author: row.get("author")?,
        rating: u8::try_from(rating).with_context(|| format!("rating {rating} out of range"))?,
        title: row.get("title")?,
        content: row.get("content")?,
        date: row.get("date")?,
        source: parse_source(&source)?,
        helpful_count: helpful_count
            .map(|count| to_u32(count, "helpful_count"))
            .transpose()?,
        app_version: row.get("app_version")?,
    })
}

impl Database {
    /// Entry for `cache_key` with its reviews, read in one transaction.
    /// Expired entries come back without their rows.
    pub async fn load_cache_entry(
        &self,
        cache_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CachedReviews>> {
        let cache_key = cache_key.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let entry = tx
                .query_row(
                    &format!("SELECT {ENTRY_COLUMNS} FROM cache_entries WHERE cache_key = ?1"),
                    params![cache_key],
                    |row| Ok(row_to_entry(row)),
                )
                .optional()?
                .transpose()?;

            let Some(entry) = entry.filter(|entry| entry.is_valid_at(now)) else {
                return Ok(None);
            };

            let reviews = {
                let mut stmt = tx.prepare(
                    "SELECT id, source, author, rating, title, content, date, helpful_count, app_version
                     FROM cached_reviews
                     WHERE generation = ?1
                     ORDER BY position ASC",
                )?;
                let mut rows = stmt.query(params![entry.generation])?;
                let mut reviews = Vec::new();
                while let Some(row) = rows.next()? {
                    reviews.push(row_to_review(row)?);
                }
                reviews
            };

            tx.commit()?;
            Ok(Some(CachedReviews { entry, reviews }))
        })
        .await
    }

    /// Swap in a new generation for `entry.cache_key`, dropping the old one.
    pub async fn replace_cache_entry(&self, entry: CacheEntry, reviews: Vec<Review>) -> Result<()> {
        self.execute(move |conn| {
            let distribution = serde_json::to_string(&entry.stats.rating_distribution)
                .context("failed to encode rating_distribution")?;

            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM cached_reviews
                 WHERE generation IN (SELECT generation FROM cache_entries WHERE cache_key = ?1)",
                params![entry.cache_key],
            )?;
            tx.execute(
                "DELETE FROM cache_entries WHERE cache_key = ?1",
                params![entry.cache_key],
            )?;
            tx.execute(
                &format!(
                    "INSERT INTO cache_entries ({ENTRY_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                ),
                params![
                    entry.cache_key,
                    i64::from(entry.window_hours),
                    entry.source_filter.map(|source| source.as_str()),
                    entry.generation,
                    i64::from(entry.stats.total_reviews),
                    entry.stats.average_rating,
                    distribution,
                    i64::from(entry.stats.google_reviews),
                    i64::from(entry.stats.apple_reviews),
                    i64::from(entry.stats.trustpilot_reviews),
                    format_datetime(entry.fetched_at),
                    format_datetime(entry.cached_at),
                    format_datetime(entry.expires_at),
                ],
            )
            .context("failed to insert cache entry")?;

            {
                let mut stmt = tx.prepare(
                    "INSERT INTO cached_reviews
                     (generation, position, id, source, author, rating, title, content, date, helpful_count, app_version)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                )?;
                for (position, review) in reviews.iter().enumerate() {
                    stmt.execute(params![
                        entry.generation,
                        to_i64(position as u64)?,
                        review.id,
                        review.source.as_str(),
                        review.author,
                        i64::from(review.rating),
                        review.title,
                        review.content,
                        review.date,
                        review.helpful_count.map(i64::from),
                        review.app_version,
                    ])
                    .with_context(|| format!("failed to insert review {}", review.id))?;
                }
            }

            tx.commit().context("failed to commit cache entry")?;
            Ok(())
        })
        .await
    }

    /// Drop entries expired at `now`, their rows, and rows no entry refers to.
    pub async fn delete_expired_cache_entries(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        self.execute(move |conn| {
            let now = format_datetime(now);
            let tx = conn.transaction()?;

            tx.execute(
                "DELETE FROM cached_reviews
                 WHERE generation IN (SELECT generation FROM cache_entries WHERE expires_at <= ?1)",
                params![now],
            )?;
            let entries_removed =
                tx.execute("DELETE FROM cache_entries WHERE expires_at <= ?1", params![now])?;
            let orphan_rows_removed = tx.execute(
                "DELETE FROM cached_reviews
                 WHERE generation NOT IN (SELECT generation FROM cache_entries)",
                [],
            )?;

            tx.commit()?;
            Ok(SweepReport {
                entries_removed: entries_removed as u64,
                orphan_rows_removed: orphan_rows_removed as u64,
            })
        })
        .await
    }

    /// Remove one entry and its rows. Returns the number of entries removed.
    pub async fn delete_cache_entry(&self, cache_key: &str) -> Result<u64> {
        let cache_key = cache_key.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM cached_reviews
                 WHERE generation IN (SELECT generation FROM cache_entries WHERE cache_key = ?1)",
                params![cache_key],
            )?;
            let removed =
                tx.execute("DELETE FROM cache_entries WHERE cache_key = ?1", params![cache_key])?;
            tx.commit()?;
            Ok(removed as u64)
        })
        .await
    }

    pub async fn delete_all_cache_entries(&self) -> Result<u64> {
        self.execute(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM cached_reviews", [])?;
            let removed = tx.execute("DELETE FROM cache_entries", [])?;
            tx.commit()?;
            Ok(removed as u64)
        })
        .await
    }

    pub async fn cache_occupancy(&self, now: DateTime<Utc>) -> Result<CacheOccupancy> {
        self.execute(move |conn| {
            let (cache_entries, total_reviews, oldest_cache, newest_cache, valid_caches) = conn
                .query_row(
                    "SELECT COUNT(*),
                            (SELECT COUNT(*) FROM cached_reviews),
                            MIN(cached_at),
                            MAX(cached_at),
                            COALESCE(SUM(CASE WHEN expires_at > ?1 THEN 1 ELSE 0 END), 0)
                     FROM cache_entries",
                    params![format_datetime(now)],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, Option<String>>(2)?,
                            row.get::<_, Option<String>>(3)?,
                            row.get::<_, i64>(4)?,
                        ))
                    },
                )
                .context("failed to read cache occupancy")?;

            Ok(CacheOccupancy {
                cache_entries: to_u64(cache_entries, "cache_entries")?,
                total_reviews: to_u64(total_reviews, "total_reviews")?,
                oldest_cache: parse_optional_datetime(oldest_cache, "oldest_cache")?,
                newest_cache: parse_optional_datetime(newest_cache, "newest_cache")?,
                valid_caches: to_u64(valid_caches, "valid_caches")?,
            })
        })
        .await
    }
}
