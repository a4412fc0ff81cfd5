//! Persistence gate: record every verdict, keep only authentic media.
//!
//! [`PersistenceGate::commit`] always appends a [`ClassificationRecord`]
//! first. Only when the verdict is authentic does it copy the upload into
//! the media directory and write a sibling metadata file holding the
//! filename, timestamp, SHA3-256 content hash and owner tag. Anything else is
//! discarded, which is the expected outcome for manipulated media and not an
//! error.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use tracing::{debug, error, info};

use crate::error::{DeeptraceError, Result};
use crate::media::{AggregatedResult, MediaKind};
use crate::store::{ClassificationRecord, NewRecord, RecordStore};

const HASH_BLOCK_SIZE: usize = 4096;

/// Fallback name when sanitising leaves nothing.
const FALLBACK_FILENAME: &str = "upload";

/// Reduce a client-supplied filename to a safe single path component.
///
/// Non-ASCII characters are dropped, path separators become spaces,
/// whitespace runs collapse to `_`, only `[A-Za-z0-9_.-]` is kept and
/// leading or trailing `.`/`_` are stripped.
pub fn secure_filename(name: &str) -> String {
    let ascii: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    let trimmed = kept.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Hex SHA3-256 of a file, read in 4 KiB blocks.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha3_256::new();
    let mut block = [0u8; HASH_BLOCK_SIZE];
    loop {
        let read = file.read(&mut block)?;
        if read == 0 {
            break;
        }
        hasher.update(&block[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Sidecar metadata written next to persisted media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub filename: String,
    /// RFC 3339, local time.
    pub timestamp: String,
    /// Hex SHA3-256 of the persisted bytes.
    pub file_hash: String,
    pub owner: String,
}

/// Where a persisted upload landed.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedMedia {
    pub media_path: PathBuf,
    pub metadata_path: PathBuf,
    pub metadata: MediaMetadata,
}

/// Durable media directory.
#[derive(Debug, Clone)]
pub struct MediaStore {
    dir: PathBuf,
}

impl MediaStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy `source` into the store as `filename` (sanitised) and write its
    /// metadata sidecar.
    ///
    /// # Errors
    ///
    /// Returns [`DeeptraceError::Persistence`] if the copy cannot be verified
    /// on disk or either write fails.
    pub fn save(&self, source: &Path, filename: &str, owner: &str) -> Result<SavedMedia> {
        let safe_name = secure_filename(filename);
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            DeeptraceError::Persistence(format!("Cannot create {}: {e}", self.dir.display()))
        })?;

        let media_path = self.dir.join(&safe_name);
        std::fs::copy(source, &media_path).map_err(|e| {
            DeeptraceError::Persistence(format!("Failed to save {safe_name}: {e}"))
        })?;
        if !media_path.is_file() {
            return Err(DeeptraceError::Persistence(format!(
                "File not saved: {}",
                media_path.display()
            )));
        }

        let metadata = MediaMetadata {
            filename: safe_name.clone(),
            timestamp: Local::now().to_rfc3339(),
            file_hash: hash_file(&media_path)?,
            owner: owner.to_string(),
        };

        // Full name, so no upload can share a sidecar or be its own sidecar
        let metadata_path = self.dir.join(format!("{safe_name}.json"));
        let json = serde_json::to_vec_pretty(&metadata)
            .map_err(|e| DeeptraceError::Persistence(format!("Invalid metadata: {e}")))?;
        std::fs::write(&metadata_path, json).map_err(|e| {
            DeeptraceError::Persistence(format!("Failed to write metadata: {e}"))
        })?;

        debug!(
            media = %media_path.display(),
            metadata = %metadata_path.display(),
            hash = %metadata.file_hash,
            "Media persisted"
        );

        Ok(SavedMedia {
            media_path,
            metadata_path,
            metadata,
        })
    }
}

/// What [`PersistenceGate::commit`] did.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitOutcome {
    pub record: ClassificationRecord,
    /// `Some` only for authentic verdicts.
    pub saved: Option<SavedMedia>,
}

impl CommitOutcome {
    pub fn persisted(&self) -> bool {
        self.saved.is_some()
    }
}

/// Appends the record, then persists or discards the media.
pub struct PersistenceGate {
    records: Arc<dyn RecordStore>,
    media: MediaStore,
    owner: String,
    platform: String,
}

impl PersistenceGate {
    pub fn new(
        records: Arc<dyn RecordStore>,
        media: MediaStore,
        owner: impl Into<String>,
        platform: impl Into<String>,
    ) -> Self {
        Self {
            records,
            media,
            owner: owner.into(),
            platform: platform.into(),
        }
    }

    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    pub fn media(&self) -> &MediaStore {
        &self.media
    }

    /// Record `verdict` for an upload staged at `source` and persist the
    /// upload if the verdict is authentic.
    pub async fn commit(
        &self,
        verdict: &AggregatedResult,
        kind: MediaKind,
        source: &Path,
        filename: &str,
    ) -> Result<CommitOutcome> {
        let record = self
            .records
            .append(NewRecord::new(verdict, kind, &self.platform))
            .await?;

        if !verdict.is_authentic() {
            info!(
                record_id = record.id,
                prediction = %verdict.label,
                kind = %kind,
                "Skipping persistence for non-authentic media"
            );
            return Ok(CommitOutcome {
                record,
                saved: None,
            });
        }

        let media = self.media.clone();
        let source = source.to_path_buf();
        let filename = filename.to_string();
        let owner = self.owner.clone();
        let saved = tokio::task::spawn_blocking(move || media.save(&source, &filename, &owner))
            .await
            .map_err(|e| DeeptraceError::Persistence(format!("Save task failed: {e}")))?
            .inspect_err(|e| error!(error = %e, record_id = record.id, "Persisting media failed"))?;

        info!(
            record_id = record.id,
            media = %saved.media_path.display(),
            "Authentic media persisted"
        );
        Ok(CommitOutcome {
            record,
            saved: Some(saved),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::Label;
    use crate::store::MemoryRecordStore;

    #[test]
    fn test_secure_filename() {
        assert_eq!(secure_filename("My cool movie.mov"), "My_cool_movie.mov");
        assert_eq!(secure_filename("../../../etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("i contain cool \u{fc}ml\u{e4}uts.txt"), "i_contain_cool_mluts.txt");
        assert_eq!(secure_filename("..\\windows\\face.png"), "windows_face.png");
        assert_eq!(secure_filename("__.."), "upload");
        assert_eq!(secure_filename(""), "upload");
        assert_eq!(secure_filename("\u{5f71}\u{50cf}.jpg"), "jpg");
    }

    #[test]
    fn test_hash_is_stable_and_matches_sha3() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, b"").unwrap();
        assert_eq!(
            hash_file(&path).unwrap(),
            "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a"
        );

        let big: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &big).unwrap();
        let expected = hex::encode(Sha3_256::digest(&big));
        assert_eq!(hash_file(&path).unwrap(), expected);
        assert_eq!(hash_file(&path).unwrap(), expected);
    }

    #[test]
    fn test_media_store_writes_sidecar() {
        let staging = tempfile::tempdir().unwrap();
        let source = staging.path().join("tmp123");
        std::fs::write(&source, b"pixels").unwrap();

        let media_dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(media_dir.path().join("nested"));
        let saved = store.save(&source, "holiday photo.png", "DeepTracers").unwrap();

        assert_eq!(saved.media_path, media_dir.path().join("nested/holiday_photo.png"));
        assert_eq!(saved.metadata_path, media_dir.path().join("nested/holiday_photo.png.json"));
        assert_eq!(std::fs::read(&saved.media_path).unwrap(), b"pixels");

        let on_disk: MediaMetadata =
            serde_json::from_slice(&std::fs::read(&saved.metadata_path).unwrap()).unwrap();
        assert_eq!(on_disk, saved.metadata);
        assert_eq!(on_disk.owner, "DeepTracers");
        assert_eq!(on_disk.filename, "holiday_photo.png");
        assert!(chrono::DateTime::parse_from_rfc3339(&on_disk.timestamp).is_ok());
    }

    #[test]
    fn test_json_named_media_keeps_its_bytes() {
        let staging = tempfile::tempdir().unwrap();
        let source = staging.path().join("upload");
        std::fs::write(&source, b"\x89PNG\r\n").unwrap();

        let media_dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(media_dir.path());
        let saved = store.save(&source, "portrait.json", "DeepTracers").unwrap();

        assert_ne!(saved.media_path, saved.metadata_path);
        assert_eq!(std::fs::read(&saved.media_path).unwrap(), b"\x89PNG\r\n");
        assert_eq!(saved.metadata_path, media_dir.path().join("portrait.json.json"));
        assert_eq!(hash_file(&saved.media_path).unwrap(), saved.metadata.file_hash);
    }

    #[test]
    fn test_same_stem_different_extension_keeps_both_sidecars() {
        let staging = tempfile::tempdir().unwrap();
        let image = staging.path().join("image");
        let video = staging.path().join("video");
        std::fs::write(&image, b"image bytes").unwrap();
        std::fs::write(&video, b"video bytes").unwrap();

        let media_dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(media_dir.path());
        let first = store.save(&image, "a.png", "owner").unwrap();
        let second = store.save(&video, "a.mp4", "owner").unwrap();

        let first_on_disk: MediaMetadata =
            serde_json::from_slice(&std::fs::read(&first.metadata_path).unwrap()).unwrap();
        let second_on_disk: MediaMetadata =
            serde_json::from_slice(&std::fs::read(&second.metadata_path).unwrap()).unwrap();
        assert_eq!(first_on_disk.filename, "a.png");
        assert_eq!(second_on_disk.filename, "a.mp4");
        assert_eq!(std::fs::read_dir(media_dir.path()).unwrap().count(), 4);
    }

    #[test]
    fn test_missing_source_is_persistence_error() {
        let media_dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(media_dir.path());
        let err = store
            .save(Path::new("/nonexistent/upload"), "x.png", "owner")
            .unwrap_err();
        assert!(matches!(err, DeeptraceError::Persistence(_)));
    }

    #[tokio::test]
    async fn test_gate_discards_fake_but_records_it() {
        let staging = tempfile::tempdir().unwrap();
        let source = staging.path().join("upload");
        std::fs::write(&source, b"bytes").unwrap();
        let media_dir = tempfile::tempdir().unwrap();

        let records = Arc::new(MemoryRecordStore::new());
        let gate = PersistenceGate::new(
            records.clone(),
            MediaStore::new(media_dir.path()),
            "DeepTracers",
            "instagram",
        );

        let fake = AggregatedResult {
            label: Label::Manipulated,
            confidence: 0.9,
        };
        let outcome = gate.commit(&fake, MediaKind::Image, &source, "a.png").await.unwrap();
        assert!(!outcome.persisted());
        assert_eq!(outcome.record.status, "fake");
        assert_eq!(records.len(), 1);
        assert_eq!(std::fs::read_dir(media_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_gate_records_even_when_save_fails() {
        let media_dir = tempfile::tempdir().unwrap();
        let records = Arc::new(MemoryRecordStore::new());
        let gate = PersistenceGate::new(
            records.clone(),
            MediaStore::new(media_dir.path()),
            "DeepTracers",
            "instagram",
        );
        let real = AggregatedResult {
            label: Label::Authentic,
            confidence: 0.1,
        };
        let result = gate
            .commit(&real, MediaKind::Audio, Path::new("/nonexistent/upload"), "a.wav")
            .await;
        assert!(result.is_err());
        assert_eq!(records.len(), 1);
    }
}
