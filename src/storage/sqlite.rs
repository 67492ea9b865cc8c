//! SQLite storage backend.
//!
//! A file-based store for single-machine deployments: the namespace becomes
//! `{namespace}.db` next to the working directory. Good for:
//! - cron jobs on one host
//! - local development
//! - tests, against an in-memory database

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use super::Storer;
use crate::error::StorageError;
use crate::search::SearchResult;

pub struct SqliteStorer {
    pool: SqlitePool,
}

impl SqliteStorer {
    /// Open (creating if needed) `{namespace}.db`.
    pub async fn open(namespace: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::new()
            .filename(format!("{namespace}.db"))
            .create_if_missing(true);
        Self::connect(options, 5).await
    }

    #[cfg(test)]
    pub async fn in_memory() -> Result<Self, StorageError> {
        use std::str::FromStr;

        // Every connection to `:memory:` is a separate database, so keep one.
        Self::connect(SqliteConnectOptions::from_str("sqlite::memory:")?, 1).await
    }

    async fn connect(options: SqliteConnectOptions, max_connections: u32) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS search_results (
                platform TEXT NOT NULL,
                keyword TEXT NOT NULL,
                title TEXT NOT NULL,
                url TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                content TEXT NOT NULL DEFAULT '',
                PRIMARY KEY (platform, url)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS last_search_time (
                platform TEXT PRIMARY KEY,
                last_search_time INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Storer for SqliteStorer {
    async fn exists(&self, platform: &str, url: &str) -> Result<bool, StorageError> {
        let found: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM search_results WHERE platform = ? AND url = ?)",
        )
        .bind(platform)
        .bind(url)
        .fetch_one(&self.pool)
        .await?;
        Ok(found != 0)
    }

    async fn save(&self, result: &SearchResult) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO search_results (platform, keyword, title, url, timestamp, content)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(platform, url) DO NOTHING
            "#,
        )
        .bind(&result.platform)
        .bind(&result.keyword)
        .bind(&result.title)
        .bind(&result.url)
        .bind(result.timestamp)
        .bind(&result.content)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_last_search_time(&self, platform: &str) -> Result<i64, StorageError> {
        let value: Option<i64> =
            sqlx::query_scalar("SELECT last_search_time FROM last_search_time WHERE platform = ?")
                .bind(platform)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value.unwrap_or(0))
    }

    async fn set_last_search_time(&self, platform: &str, epoch: i64) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO last_search_time (platform, last_search_time)
            VALUES (?, ?)
            ON CONFLICT(platform) DO UPDATE SET last_search_time = excluded.last_search_time
            "#,
        )
        .bind(platform)
        .bind(epoch)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
