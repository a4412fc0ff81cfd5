//! Deterministic model doubles for tests and offline runs.
//!
//! WARNING: these do not look at the media at all. Never use them to judge
//! real uploads.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use image::RgbImage;

use super::{FaceModel, SpectrogramModel};
use crate::audio::MfccGrid;
use crate::error::{DeeptraceError, Result};

/// What a [`MockFaceModel`] answers for one unit.
#[derive(Debug, Clone, PartialEq)]
pub enum MockFaceOutcome {
    /// A face is found and scored with the given sigmoid output.
    Face(f64),
    /// No face is found.
    NoFace,
    /// Detection fails with an inference error.
    Fail(String),
}

/// Face model that replays a script of outcomes, cycling when exhausted.
#[derive(Debug)]
pub struct MockFaceModel {
    script: Vec<MockFaceOutcome>,
    calls: AtomicUsize,
}

impl MockFaceModel {
    pub fn scripted(script: Vec<MockFaceOutcome>) -> Self {
        let script = if script.is_empty() {
            vec![MockFaceOutcome::NoFace]
        } else {
            script
        };
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every image contains a face scored `score`.
    pub fn with_score(score: f64) -> Self {
        Self::scripted(vec![MockFaceOutcome::Face(score)])
    }

    /// One face per image, scored from `scores` in turn.
    pub fn with_scores(scores: impl IntoIterator<Item = f64>) -> Self {
        Self::scripted(scores.into_iter().map(MockFaceOutcome::Face).collect())
    }

    pub fn no_face() -> Self {
        Self::scripted(vec![MockFaceOutcome::NoFace])
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::scripted(vec![MockFaceOutcome::Fail(message.into())])
    }

    /// Number of detection calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Encodes the scripted score into the crop so `score` can recover it.
/// Two bytes per pixel in the red and green channels.
fn encode_score(score: f64) -> RgbImage {
    let bytes = score.to_le_bytes();
    RgbImage::from_fn(2, 2, |x, y| {
        let i = 2 * (y * 2 + x) as usize;
        image::Rgb([bytes[i], bytes[i + 1], 0])
    })
}

fn decode_score(face: &RgbImage) -> Option<f64> {
    if face.dimensions() != (2, 2) {
        return None;
    }
    let mut bytes = [0u8; 8];
    for (i, pair) in bytes.chunks_exact_mut(2).enumerate() {
        let (x, y) = ((i % 2) as u32, (i / 2) as u32);
        let pixel = face.get_pixel(x, y);
        pair[0] = pixel[0];
        pair[1] = pixel[1];
    }
    Some(f64::from_le_bytes(bytes))
}

#[async_trait]
impl FaceModel for MockFaceModel {
    async fn detect_face(&self, _image: &RgbImage) -> Result<Option<RgbImage>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script[call % self.script.len()] {
            MockFaceOutcome::Face(score) => Ok(Some(encode_score(*score))),
            MockFaceOutcome::NoFace => Ok(None),
            MockFaceOutcome::Fail(message) => Err(DeeptraceError::Inference(message.clone())),
        }
    }

    async fn score(&self, face: &RgbImage) -> Result<f64> {
        decode_score(face).ok_or_else(|| {
            DeeptraceError::Inference("Mock face model received a foreign crop".into())
        })
    }

    fn backend(&self) -> &'static str {
        "mock"
    }
}

/// Spectrogram model returning a fixed score or a fixed failure.
#[derive(Debug, Clone)]
pub struct MockSpectrogramModel {
    outcome: std::result::Result<f64, String>,
}

impl MockSpectrogramModel {
    pub fn with_score(score: f64) -> Self {
        Self { outcome: Ok(score) }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            outcome: Err(message.into()),
        }
    }
}

#[async_trait]
impl SpectrogramModel for MockSpectrogramModel {
    async fn score(&self, features: &MfccGrid) -> Result<f64> {
        debug_assert_eq!(features.shape(), (crate::audio::N_MFCC, crate::audio::MAX_FRAMES));
        self.outcome.clone().map_err(DeeptraceError::Inference)
    }

    fn backend(&self) -> &'static str {
        "mock"
    }
}
