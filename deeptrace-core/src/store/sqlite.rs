//! SQLite-backed record store.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

use super::{ClassificationRecord, NewRecord, RecordStore};
use crate::error::{DeeptraceError, Result};

/// Record store over a `predictions` table.
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Connect to `database_url`, creating the database file if missing.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| DeeptraceError::RecordStore(format!("Invalid database URL: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| DeeptraceError::RecordStore(format!("Connection failed: {e}")))?;

        tracing::info!(database_url = %database_url, "Connected to SQLite record store");
        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DeeptraceError::RecordStore(format!("Migration failed: {e}")))?;

        tracing::info!("Record store migrations completed");
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn append(&self, record: NewRecord) -> Result<ClassificationRecord> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO predictions (date, time, platform, status, confidence, media_format)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING id
            "#,
        )
        .bind(&record.date)
        .bind(&record.time)
        .bind(&record.platform)
        .bind(&record.status)
        .bind(record.confidence)
        .bind(&record.media_format)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DeeptraceError::RecordStore(e.to_string()))?;

        tracing::debug!(id, status = %record.status, "Record appended");
        Ok(record.with_id(id))
    }

    async fn list_all(&self) -> Result<Vec<ClassificationRecord>> {
        sqlx::query_as::<_, ClassificationRecord>(
            r#"
            SELECT id, date, time, platform, status, confidence, media_format
            FROM predictions
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DeeptraceError::RecordStore(e.to_string()))
    }

    async fn check_health(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| DeeptraceError::RecordStore(e.to_string()))?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}
