//! Append-only log of classification events.
//!
//! Every request that reaches a verdict appends exactly one row, whether or
//! not the media itself is kept. Rows are never updated or deleted here.

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryRecordStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteRecordStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::media::{AggregatedResult, MediaKind};

/// A stored classification event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlite", derive(sqlx::FromRow))]
pub struct ClassificationRecord {
    pub id: i64,
    /// Local date, `YYYY-MM-DD`.
    pub date: String,
    /// Local time, `HH:MM:SS`.
    pub time: String,
    pub platform: String,
    /// Label wire name.
    pub status: String,
    /// Rounded to 2 decimals.
    pub confidence: f64,
    pub media_format: String,
}

/// A row to append; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub date: String,
    pub time: String,
    pub platform: String,
    pub status: String,
    pub confidence: f64,
    pub media_format: String,
}

impl NewRecord {
    /// Build a row for `result`, stamped with the current local time.
    pub fn new(result: &AggregatedResult, kind: MediaKind, platform: &str) -> Self {
        Self::at(result, kind, platform, Local::now())
    }

    pub fn at(
        result: &AggregatedResult,
        kind: MediaKind,
        platform: &str,
        now: DateTime<Local>,
    ) -> Self {
        Self {
            date: now.format("%Y-%m-%d").to_string(),
            time: now.format("%H:%M:%S").to_string(),
            platform: platform.to_string(),
            status: result.label.as_str().to_string(),
            confidence: round2(result.confidence),
            media_format: kind.as_str().to_string(),
        }
    }

    pub(crate) fn with_id(self, id: i64) -> ClassificationRecord {
        ClassificationRecord {
            id,
            date: self.date,
            time: self.time,
            platform: self.platform,
            status: self.status,
            confidence: self.confidence,
            media_format: self.media_format,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Durable, append-only record storage.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Append a row and return it with its assigned id.
    async fn append(&self, record: NewRecord) -> Result<ClassificationRecord>;

    /// Every row, oldest first.
    async fn list_all(&self) -> Result<Vec<ClassificationRecord>>;

    /// Check that the store is reachable.
    async fn check_health(&self) -> Result<()> {
        Ok(())
    }

    /// Short backend name for health reporting.
    fn backend(&self) -> &'static str;
}

#[async_trait]
impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    async fn append(&self, record: NewRecord) -> Result<ClassificationRecord> {
        (**self).append(record).await
    }

    async fn list_all(&self) -> Result<Vec<ClassificationRecord>> {
        (**self).list_all().await
    }

    async fn check_health(&self) -> Result<()> {
        (**self).check_health().await
    }

    fn backend(&self) -> &'static str {
        (**self).backend()
    }
}
