//! SQLite persistence for crawl runs.
//!
//! The crawler writes three tables: `posts` is the idempotent identity of a
//! listing (one row per external id and website), `post_histories` is the
//! append-only observation log, and `crawl_histories` records one row per
//! orchestrator run.

use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

use crate::models::{CrawlRun, NormalizedListing};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        external_id TEXT NOT NULL,
        website TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (external_id, website)
    )",
    "CREATE TABLE IF NOT EXISTS crawl_histories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        post_count INTEGER NOT NULL,
        cpu_usage REAL NOT NULL,
        memory_usage REAL NOT NULL,
        request_count INTEGER NOT NULL,
        started_at TEXT NOT NULL,
        finished_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS post_histories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        post_id INTEGER NOT NULL REFERENCES posts (id),
        crawl_history_id INTEGER NOT NULL REFERENCES crawl_histories (id),
        title TEXT NOT NULL,
        post_url TEXT NOT NULL,
        price INTEGER NOT NULL,
        deposit INTEGER NOT NULL,
        rent INTEGER NOT NULL,
        city TEXT NOT NULL,
        neighborhood TEXT NOT NULL,
        area INTEGER NOT NULL,
        rooms INTEGER NOT NULL,
        age INTEGER NOT NULL,
        floor INTEGER NOT NULL,
        has_storage INTEGER NOT NULL,
        has_parking INTEGER NOT NULL,
        has_elevator INTEGER NOT NULL,
        image_urls TEXT NOT NULL,
        description TEXT NOT NULL,
        capacity TEXT NOT NULL DEFAULT '',
        normal_day_price TEXT NOT NULL DEFAULT '',
        weekend_price TEXT NOT NULL DEFAULT '',
        holiday_price TEXT NOT NULL DEFAULT '',
        extra_person_cost TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (crawl_history_id, post_url)
    )",
];

/// Pool-backed listing store
pub struct ListingStore {
    pool: SqlitePool,
}

impl ListingStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .with_context(|| format!("connecting to {database_url}"))?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .context("creating schema")?;
        }

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Persist one finished run: a crawl_histories row plus, per listing, a
    /// create-if-absent post and an observation row. A single listing's
    /// failure is logged and skipped; the rest of the run still lands.
    pub async fn save_run(&self, run: &CrawlRun) -> Result<i64> {
        let crawl_id: i64 = sqlx::query(
            "INSERT INTO crawl_histories
                (post_count, cpu_usage, memory_usage, request_count, started_at, finished_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(run.listings.len() as i64)
        .bind(run.avg_cpu)
        .bind(run.avg_memory)
        .bind(run.request_count as i64)
        .bind(run.started_at)
        .bind(run.finished_at)
        .fetch_one(&self.pool)
        .await
        .context("recording crawl history")?
        .get(0);

        let mut saved = 0usize;
        for listing in &run.listings {
            match self.save_listing(crawl_id, listing).await {
                Ok(()) => saved += 1,
                Err(err) => {
                    warn!(link = %listing.link, error = %err, "failed to persist listing");
                }
            }
        }
        info!(crawl_id, saved, total = run.listings.len(), "crawl run persisted");

        Ok(crawl_id)
    }

    async fn save_listing(&self, crawl_id: i64, listing: &NormalizedListing) -> Result<()> {
        sqlx::query(
            "INSERT INTO posts (external_id, website) VALUES (?, ?)
             ON CONFLICT (external_id, website) DO NOTHING",
        )
        .bind(&listing.external_id)
        .bind(listing.site.as_str())
        .execute(&self.pool)
        .await
        .context("upserting post")?;

        let post_id: i64 = sqlx::query("SELECT id FROM posts WHERE external_id = ? AND website = ?")
            .bind(&listing.external_id)
            .bind(listing.site.as_str())
            .fetch_one(&self.pool)
            .await
            .context("resolving post id")?
            .get(0);

        let rental = listing.rental_metadata.clone().unwrap_or_default();
        sqlx::query(
            "INSERT INTO post_histories
                (post_id, crawl_history_id, title, post_url, price, deposit, rent,
                 city, neighborhood, area, rooms, age, floor,
                 has_storage, has_parking, has_elevator, image_urls, description,
                 capacity, normal_day_price, weekend_price, holiday_price, extra_person_cost)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (crawl_history_id, post_url) DO NOTHING",
        )
        .bind(post_id)
        .bind(crawl_id)
        .bind(&listing.title)
        .bind(&listing.link)
        .bind(listing.price)
        .bind(listing.deposit)
        .bind(listing.rent)
        .bind(&listing.city)
        .bind(&listing.neighborhood)
        .bind(listing.area)
        .bind(listing.rooms)
        .bind(listing.age)
        .bind(listing.floor)
        .bind(listing.has_storage)
        .bind(listing.has_parking)
        .bind(listing.has_elevator)
        .bind(listing.images.join(","))
        .bind(&listing.description)
        .bind(&rental.capacity)
        .bind(&rental.normal_day_price)
        .bind(&rental.weekend_price)
        .bind(&rental.holiday_price)
        .bind(&rental.extra_person_cost)
        .execute(&self.pool)
        .await
        .context("recording post history")?;

        Ok(())
    }
}
