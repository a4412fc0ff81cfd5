//! DeepTrace Core - deepfake detection pipeline
//!
//! This crate classifies uploaded images, audio clips and videos as authentic
//! or manipulated, records every verdict and keeps only authentic media.
//!
//! # Features
//!
//! - Face-based classification of images and sampled video frames
//! - MFCC spectrogram classification of audio clips
//! - Majority-vote aggregation of per-frame results
//! - Append-only record store (in-memory or SQLite)
//! - Persistence gate writing authentic media plus a SHA3-256 metadata sidecar
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use deeptrace_core::{
//!     Detector, MediaKind, MediaStore, MemoryRecordStore, MockFaceModel,
//!     MockSpectrogramModel, PersistenceGate, StagedUpload,
//! };
//!
//! # async fn example() -> deeptrace_core::Result<()> {
//! // Mock models for testing (in production, use RemoteModel)
//! let detector = Detector::builder(
//!     Arc::new(MockFaceModel::with_score(0.1)),
//!     Arc::new(MockSpectrogramModel::with_score(0.1)),
//! )
//! .build();
//!
//! let gate = PersistenceGate::new(
//!     Arc::new(MemoryRecordStore::new()),
//!     MediaStore::new("media"),
//!     "DeepTracers",
//!     "instagram",
//! );
//!
//! let bytes = std::fs::read("portrait.jpg")?;
//! let upload = StagedUpload::write(Path::new("uploads"), "portrait.jpg", MediaKind::Image, &bytes)?;
//! let outcome = deeptrace_core::pipeline::run(&detector, &gate, &upload).await?;
//! println!("{}", outcome.classification.result.label);
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod audio;
pub mod classifier;
pub mod error;
pub mod frames;
pub mod media;
pub mod persist;
pub mod pipeline;
pub mod store;

// Re-export main types for convenience
pub use aggregate::aggregate;
pub use classifier::{
    AudioClassifier, FaceClassifier, FaceModel, MockFaceModel, MockFaceOutcome,
    MockSpectrogramModel, SpectrogramModel, UnitClassifier,
};
pub use error::{DeeptraceError, Result};
pub use frames::{FixedOffset, OffsetSource, RandomOffset, SamplerConfig, SeededOffset};
pub use media::{AggregatedResult, ClassificationResult, Label, MediaKind, FAKE_THRESHOLD};
pub use persist::{hash_file, secure_filename, CommitOutcome, MediaMetadata, MediaStore, PersistenceGate};
pub use pipeline::{Classification, Detector, PipelineOutcome, StagedUpload};
pub use store::{ClassificationRecord, MemoryRecordStore, NewRecord, RecordStore};

// Network-dependent exports
#[cfg(feature = "network")]
pub use classifier::{RemoteModel, RemoteModelConfig};

#[cfg(feature = "sqlite")]
pub use store::SqliteRecordStore;
