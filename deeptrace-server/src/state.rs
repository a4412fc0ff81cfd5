//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::path::PathBuf;
use std::sync::Arc;

use deeptrace_core::{Detector, MediaStore, PersistenceGate, RecordStore};

use crate::config::Config;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Classification pipeline with its model handles
    pub detector: Arc<Detector>,
    /// Record store plus durable media directory
    pub gate: Arc<PersistenceGate>,
    /// Directory for temporary uploads
    pub upload_dir: PathBuf,
    /// Per-file upload limit in bytes
    pub max_file_size: usize,
}

impl AppState {
    /// Wire a detector and a record store with the directories and tags from
    /// `config`.
    pub fn new(config: &Config, detector: Detector, records: Arc<dyn RecordStore>) -> Self {
        let gate = PersistenceGate::new(
            records,
            MediaStore::new(&config.media_dir),
            config.owner_tag.clone(),
            config.platform_tag.clone(),
        );
        Self {
            detector: Arc::new(detector),
            gate: Arc::new(gate),
            upload_dir: config.upload_dir.clone(),
            max_file_size: config.max_file_size(),
        }
    }

    pub fn records(&self) -> &Arc<dyn RecordStore> {
        self.gate.records()
    }
}
