//! SQLite-backed store.
//!
//! One table, keyed on the normalized prompt:
//!
//! ```sql
//! generated_images(prompt TEXT PRIMARY KEY, image BLOB, rating_sum INTEGER, rating_count INTEGER)
//! ```
//!
//! Concurrency guarantees come from SQLite itself. The primary key plus
//! `ON CONFLICT DO NOTHING` makes inserts first-writer-wins, and votes are a
//! single `UPDATE … RETURNING` statement so concurrent votes cannot be lost.
//!
//! Faults after a successful connect are reported per call: lookups come
//! back [`Lookup::Unavailable`] and writes fail with
//! [`PixcacheError::StoreUnavailable`], whatever the underlying SQLite
//! error was. The first fault after a healthy period is logged at `warn`,
//! later ones at `debug`, and recovery is logged at `info`.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info, warn};

use super::{ImageStore, StoreConfig, StoreStatus, check_image_size};
use crate::telemetry;
use crate::types::{CacheEntry, CacheKey, InsertOutcome, Lookup, MAX_KEY_CHARS, Rating, Vote};
use crate::{PixcacheError, Result};

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Durable [`ImageStore`] on SQLite.
pub struct SqliteStore {
    pool: SqlitePool,
    healthy: AtomicBool,
}

impl SqliteStore {
    /// Connect to `url` and create the table if needed.
    ///
    /// The database file is created when missing. In-memory databases
    /// (`sqlite::memory:`) are pinned to a single long-lived connection so
    /// every caller sees the same data.
    ///
    /// # Errors
    ///
    /// Returns an error when the database cannot be opened, or when a
    /// `generated_images` table exists with an incompatible layout (another
    /// application's data).
    pub async fn connect(url: &str, config: &StoreConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);

        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let mut pool_options = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs));
        pool_options = if in_memory {
            pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options.max_connections(config.max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await?;
        let store = Self {
            pool,
            healthy: AtomicBool::new(true),
        };
        store.migrate().await?;
        Ok(store)
    }

    /// Create the table if it does not exist and verify its columns.
    async fn migrate(&self) -> Result<()> {
        let create = format!(
            r#"
            CREATE TABLE IF NOT EXISTS generated_images (
                prompt TEXT PRIMARY KEY NOT NULL CHECK (length(prompt) <= {MAX_KEY_CHARS}),
                image BLOB NOT NULL,
                rating_sum INTEGER NOT NULL DEFAULT 0,
                rating_count INTEGER NOT NULL DEFAULT 0 CHECK (rating_count >= 0)
            )
            "#
        );
        sqlx::query(&create).execute(&self.pool).await?;

        sqlx::query("SELECT prompt, image, rating_sum, rating_count FROM generated_images LIMIT 0")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                PixcacheError::Configuration(format!(
                    "table generated_images exists with an unexpected layout: {e}"
                ))
            })?;

        debug!("generated_images table ready");
        Ok(())
    }

    /// Close the pool, waiting for in-flight queries.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn record_success(&self) {
        if !self.healthy.swap(true, Ordering::AcqRel) {
            info!(store = "sqlite", "store reachable again");
        }
    }

    fn record_failure(&self, operation: &'static str, err: &sqlx::Error) {
        metrics::counter!(telemetry::STORE_ERRORS_TOTAL, "operation" => operation).increment(1);
        if self.healthy.swap(false, Ordering::AcqRel) {
            warn!(store = "sqlite", operation, error = %err, "store fault, degrading to uncached");
        } else {
            debug!(store = "sqlite", operation, error = %err, "store still faulting");
        }
    }

    /// Record a write-path fault and report it as an unavailable store.
    fn unavailable(&self, operation: &'static str, err: &sqlx::Error) -> PixcacheError {
        self.record_failure(operation, err);
        PixcacheError::StoreUnavailable
    }
}

fn rating_from_row(row: &sqlx::sqlite::SqliteRow) -> std::result::Result<Rating, sqlx::Error> {
    Ok(Rating {
        sum: row.try_get("rating_sum")?,
        count: row.try_get("rating_count")?,
    })
}

fn entry_from_row(
    key: &CacheKey,
    row: &sqlx::sqlite::SqliteRow,
) -> std::result::Result<CacheEntry, sqlx::Error> {
    Ok(CacheEntry {
        key: key.clone(),
        image: row.try_get("image")?,
        rating_sum: row.try_get("rating_sum")?,
        rating_count: row.try_get("rating_count")?,
    })
}

#[async_trait]
impl ImageStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn status(&self) -> StoreStatus {
        StoreStatus::Available
    }

    async fn lookup(&self, key: &CacheKey) -> Lookup {
        let row = sqlx::query(
            "SELECT image, rating_sum, rating_count FROM generated_images WHERE prompt = ?",
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await;

        let row = match row {
            Ok(Some(row)) => row,
            Ok(None) => {
                self.record_success();
                return Lookup::NotFound;
            }
            Err(e) => {
                self.record_failure("lookup", &e);
                return Lookup::Unavailable;
            }
        };

        match entry_from_row(key, &row) {
            Ok(entry) => {
                self.record_success();
                Lookup::Found(entry)
            }
            Err(e) => {
                self.record_failure("lookup", &e);
                Lookup::Unavailable
            }
        }
    }

    async fn insert(&self, key: &CacheKey, image: Vec<u8>) -> Result<InsertOutcome> {
        check_image_size(&image)?;
        let result = sqlx::query(
            "INSERT INTO generated_images (prompt, image) VALUES (?, ?) ON CONFLICT(prompt) DO NOTHING",
        )
        .bind(key.as_str())
        .bind(image)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => {
                self.record_success();
                if done.rows_affected() == 1 {
                    Ok(InsertOutcome::Inserted)
                } else {
                    Ok(InsertOutcome::AlreadyExists)
                }
            }
            Err(e) => Err(self.unavailable("insert", &e)),
        }
    }

    async fn update_rating(&self, key: &CacheKey, vote: Vote) -> Result<Rating> {
        let result = sqlx::query(
            r#"
            UPDATE generated_images
            SET rating_sum = rating_sum + ?, rating_count = rating_count + 1
            WHERE prompt = ?
            RETURNING rating_sum, rating_count
            "#,
        )
        .bind(vote.delta())
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await;

        let row = match result {
            Ok(Some(row)) => row,
            Ok(None) => {
                self.record_success();
                return Err(PixcacheError::NotFound(key.to_string()));
            }
            Err(e) => return Err(self.unavailable("update_rating", &e)),
        };

        match rating_from_row(&row) {
            Ok(rating) => {
                self.record_success();
                Ok(rating)
            }
            Err(e) => Err(self.unavailable("update_rating", &e)),
        }
    }

    async fn entry_count(&self) -> Result<u64> {
        let count: std::result::Result<i64, _> =
            sqlx::query_scalar("SELECT COUNT(*) FROM generated_images")
                .fetch_one(&self.pool)
                .await;
        match count {
            Ok(count) => {
                self.record_success();
                Ok(count.max(0) as u64)
            }
            Err(e) => Err(self.unavailable("entry_count", &e)),
        }
    }
}
