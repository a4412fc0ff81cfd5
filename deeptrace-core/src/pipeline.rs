//! The detection pipeline.
//!
//! A request runs in two phases. [`Detector::classify`] turns a staged upload
//! into a verdict without side effects beyond reading the upload;
//! [`PersistenceGate::commit`] then records the verdict and keeps or
//! discards the media. [`run`] chains both.

use std::path::Path;
use std::sync::Arc;

use image::RgbImage;
use tempfile::NamedTempFile;
use tracing::{info, instrument, warn};

use crate::aggregate::aggregate;
use crate::audio::{self, AudioDecoder, FfmpegAudioDecoder, MfccGrid};
use crate::classifier::{
    AudioClassifier, FaceClassifier, FaceModel, SpectrogramModel, UnitClassifier,
};
use crate::error::{DeeptraceError, Result};
use crate::frames::{
    FfmpegOpener, Frame, FrameSampler, OffsetSource, RandomOffset, SamplerConfig, VideoOpener,
};
use crate::media::{AggregatedResult, ClassificationResult, MediaKind};
use crate::persist::{CommitOutcome, PersistenceGate};

/// An uploaded file staged in a temporary location.
///
/// The temporary file is removed when the value is dropped, on every path.
pub struct StagedUpload {
    file: NamedTempFile,
    filename: String,
    kind: MediaKind,
}

impl StagedUpload {
    /// Write `bytes` to a new temporary file inside `dir`.
    ///
    /// The original extension is kept so external decoders can detect the
    /// container format.
    pub fn write(dir: &Path, filename: &str, kind: MediaKind, bytes: &[u8]) -> Result<Self> {
        use std::io::Write;

        if bytes.is_empty() {
            return Err(DeeptraceError::InvalidInput("Uploaded file is empty".into()));
        }
        std::fs::create_dir_all(dir)?;

        let suffix = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&suffix)
            .tempfile_in(dir)?;
        file.write_all(bytes)?;
        file.flush()?;

        Ok(Self {
            file,
            filename: filename.to_string(),
            kind,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Client-supplied filename, unsanitised.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }
}

/// Verdict for one upload.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub result: AggregatedResult,
    /// Per-frame results, for video only.
    pub frames: Option<Vec<ClassificationResult>>,
}

/// Classifies images, audio clips and videos with injected collaborators.
pub struct Detector {
    faces: FaceClassifier<Arc<dyn FaceModel>>,
    audio: AudioClassifier<Arc<dyn SpectrogramModel>>,
    video_opener: Arc<dyn VideoOpener>,
    audio_decoder: Arc<dyn AudioDecoder>,
    sampler: Arc<FrameSampler<Arc<dyn OffsetSource>>>,
}

/// Builder for [`Detector`]. Decoders default to `ffmpeg`, offsets to
/// [`RandomOffset`].
pub struct DetectorBuilder {
    face_model: Arc<dyn FaceModel>,
    spectrogram_model: Arc<dyn SpectrogramModel>,
    video_opener: Arc<dyn VideoOpener>,
    audio_decoder: Arc<dyn AudioDecoder>,
    offsets: Arc<dyn OffsetSource>,
    sampler_config: SamplerConfig,
}

impl DetectorBuilder {
    pub fn video_opener(mut self, opener: Arc<dyn VideoOpener>) -> Self {
        self.video_opener = opener;
        self
    }

    pub fn audio_decoder(mut self, decoder: Arc<dyn AudioDecoder>) -> Self {
        self.audio_decoder = decoder;
        self
    }

    pub fn offsets(mut self, offsets: Arc<dyn OffsetSource>) -> Self {
        self.offsets = offsets;
        self
    }

    pub fn sampler_config(mut self, config: SamplerConfig) -> Self {
        self.sampler_config = config;
        self
    }

    pub fn build(self) -> Detector {
        Detector {
            faces: FaceClassifier::new(self.face_model),
            audio: AudioClassifier::new(self.spectrogram_model),
            video_opener: self.video_opener,
            audio_decoder: self.audio_decoder,
            sampler: Arc::new(FrameSampler::new(self.sampler_config, self.offsets)),
        }
    }
}

impl Detector {
    pub fn builder(
        face_model: Arc<dyn FaceModel>,
        spectrogram_model: Arc<dyn SpectrogramModel>,
    ) -> DetectorBuilder {
        DetectorBuilder {
            face_model,
            spectrogram_model,
            video_opener: Arc::new(FfmpegOpener::default()),
            audio_decoder: Arc::new(FfmpegAudioDecoder::default()),
            offsets: Arc::new(RandomOffset),
            sampler_config: SamplerConfig::default(),
        }
    }

    /// Backend names of the face and spectrogram models.
    pub fn backends(&self) -> (&'static str, &'static str) {
        (self.faces.model().backend(), self.audio.model().backend())
    }

    pub fn sampler_config(&self) -> &SamplerConfig {
        self.sampler.config()
    }

    /// Classify the media file at `path` as `kind`.
    ///
    /// # Errors
    ///
    /// Decoding, feature extraction and model failures abort image and audio
    /// classification. For video, a failure on one frame becomes an `error`
    /// entry and the remaining frames are still classified.
    #[instrument(level = "info", skip_all, fields(kind = %kind))]
    pub async fn classify(&self, kind: MediaKind, path: &Path) -> Result<Classification> {
        let classification = match kind {
            MediaKind::Image => {
                let image = self.load_image(path).await?;
                let result = self.faces.classify(&image).await?;
                Classification {
                    result: result.into(),
                    frames: None,
                }
            }
            MediaKind::Audio => {
                let features = self.load_features(path).await?;
                let result = self.audio.classify(&features).await?;
                Classification {
                    result: result.into(),
                    frames: None,
                }
            }
            MediaKind::Video => {
                let frames = self.sample_frames(path).await?;
                let mut results = Vec::with_capacity(frames.len());
                for (index, frame) in frames.iter().enumerate() {
                    let result = match self.faces.classify(frame).await {
                        Ok(result) => result,
                        Err(e) => {
                            warn!(frame = index, error = %e, "Frame classification failed");
                            ClassificationResult::error()
                        }
                    };
                    info!(
                        frame = index,
                        prediction = %result.label,
                        confidence = result.confidence,
                        "Frame classified"
                    );
                    results.push(result);
                }
                Classification {
                    result: aggregate(&results)?,
                    frames: Some(results),
                }
            }
        };

        info!(
            prediction = %classification.result.label,
            confidence = classification.result.confidence,
            "Media classified"
        );
        Ok(classification)
    }

    async fn load_image(&self, path: &Path) -> Result<RgbImage> {
        let bytes = tokio::fs::read(path).await?;
        blocking(move || {
            image::load_from_memory(&bytes)
                .map(|image| image.to_rgb8())
                .map_err(|e| DeeptraceError::Decode(format!("Unreadable image: {e}")))
        })
        .await
    }

    async fn load_features(&self, path: &Path) -> Result<MfccGrid> {
        let decoder = Arc::clone(&self.audio_decoder);
        let path = path.to_path_buf();
        blocking(move || {
            let samples = decoder.decode(&path)?;
            audio::extract_features(&samples)
        })
        .await
    }

    async fn sample_frames(&self, path: &Path) -> Result<Vec<Frame>> {
        let opener = Arc::clone(&self.video_opener);
        let sampler = Arc::clone(&self.sampler);
        let path = path.to_path_buf();
        blocking(move || {
            let source = opener.open(&path)?;
            Ok(sampler.sample(source))
        })
        .await
    }
}

async fn blocking<T, F>(task: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| DeeptraceError::Decode(format!("Decoder task failed: {e}")))?
}

/// Result of a full request: the verdict and what the gate did with it.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub classification: Classification,
    pub commit: CommitOutcome,
}

/// Classify a staged upload, then commit the verdict through `gate`.
///
/// Classification errors return before the gate runs, so no record is
/// appended for them.
pub async fn run(
    detector: &Detector,
    gate: &PersistenceGate,
    upload: &StagedUpload,
) -> Result<PipelineOutcome> {
    let classification = detector.classify(upload.kind(), upload.path()).await?;
    let commit = gate
        .commit(
            &classification.result,
            upload.kind(),
            upload.path(),
            upload.filename(),
        )
        .await?;
    Ok(PipelineOutcome {
        classification,
        commit,
    })
}
