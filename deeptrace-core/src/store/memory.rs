//! Process-local record store.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{ClassificationRecord, NewRecord, RecordStore};
use crate::error::{DeeptraceError, Result};

/// In-memory record store with sequential ids starting at 1.
///
/// Rows are lost on restart; use it for tests and one-shot CLI runs.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    rows: Mutex<Vec<ClassificationRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> DeeptraceError {
    DeeptraceError::RecordStore("In-memory record store lock poisoned".into())
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn append(&self, record: NewRecord) -> Result<ClassificationRecord> {
        let mut rows = self.rows.lock().map_err(|_| poisoned())?;
        let stored = record.with_id(rows.len() as i64 + 1);
        rows.push(stored.clone());
        tracing::debug!(id = stored.id, status = %stored.status, "Record appended");
        Ok(stored)
    }

    async fn list_all(&self) -> Result<Vec<ClassificationRecord>> {
        Ok(self.rows.lock().map_err(|_| poisoned())?.clone())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
