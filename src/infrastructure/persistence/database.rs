use anyhow::{Context, Result};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tokio::fs;
use tracing::info;

/// SQLite connection pool with the analytics schema applied
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        let in_memory = db_url.contains(":memory:");

        // Ensure the directory exists if it's a file path
        if !in_memory && let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create database directory")?;
            }
        }

        let mut options = SqliteConnectOptions::from_str(db_url)
            .with_context(|| format!("Invalid database URL: {}", db_url))?
            .create_if_missing(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every connection to an in-memory database is a separate database,
        // so keep exactly one alive for the pool's lifetime
        let mut pool_options = SqlitePoolOptions::new().max_connections(5);
        if in_memory {
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>);
        }
        let pool = pool_options
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        info!("Connected to database: {}", db_url);

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    /// Shared in-memory database, mainly for tests
    pub async fn in_memory() -> Result<Self> {
        Self::new("sqlite::memory:").await
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS indicator_rows (
                instrument TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                rsi REAL,
                macd REAL,
                macd_signal REAL,
                macd_histogram REAL,
                bollinger_upper REAL,
                bollinger_mid REAL,
                bollinger_lower REAL,
                atr REAL,
                PRIMARY KEY (instrument, timestamp)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create indicator_rows table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS forecast_points (
                instrument TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                model TEXT NOT NULL,
                yhat REAL NOT NULL,
                yhat_lower REAL NOT NULL,
                yhat_upper REAL NOT NULL,
                kind TEXT NOT NULL,
                PRIMARY KEY (instrument, timestamp)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create forecast_points table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS anomalies (
                instrument TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                method TEXT NOT NULL,
                severity TEXT NOT NULL,
                direction TEXT NOT NULL,
                observed_value REAL NOT NULL,
                reference_value REAL NOT NULL,
                score REAL NOT NULL,
                description TEXT NOT NULL,
                detected_at INTEGER NOT NULL,
                PRIMARY KEY (instrument, timestamp, method)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create anomalies table")?;

        // Recent-anomaly queries sort by time
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_anomalies_time
            ON anomalies (timestamp);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create anomalies index")?;

        info!("Database schema initialized");
        Ok(())
    }
}
