//! Per-unit classifiers and the model contracts they adapt.
//!
//! The models themselves are external collaborators. A [`FaceModel`] finds
//! and crops a face and scores the crop; a [`SpectrogramModel`] scores an
//! MFCC grid. Both return a sigmoid output in `[0, 1]`, thresholded at 0.5:
//! below is authentic, at or above is manipulated.
//!
//! ## Example
//!
//! ```no_run
//! use deeptrace_core::classifier::{FaceClassifier, MockFaceModel, UnitClassifier};
//!
//! # async fn example() -> deeptrace_core::Result<()> {
//! let classifier = FaceClassifier::new(MockFaceModel::with_score(0.2));
//! let image = image::RgbImage::new(64, 64);
//! let result = classifier.classify(&image).await?;
//! println!("{} ({:.2})", result.label, result.confidence);
//! # Ok(())
//! # }
//! ```

mod mock;
#[cfg(feature = "network")]
mod remote;

pub use mock::{MockFaceModel, MockFaceOutcome, MockSpectrogramModel};
#[cfg(feature = "network")]
pub use remote::{RemoteModel, RemoteModelConfig};

use std::sync::Arc;

use async_trait::async_trait;
use image::RgbImage;
use tracing::debug;

use crate::audio::MfccGrid;
use crate::error::{DeeptraceError, Result};
use crate::media::ClassificationResult;

/// Face detection plus binary face classification.
#[async_trait]
pub trait FaceModel: Send + Sync {
    /// Return the cropped face, or `None` when no face is found.
    async fn detect_face(&self, image: &RgbImage) -> Result<Option<RgbImage>>;

    /// Sigmoid output for a cropped face: the probability it is fake.
    async fn score(&self, face: &RgbImage) -> Result<f64>;

    /// Short backend name for health reporting.
    fn backend(&self) -> &'static str;
}

/// Binary classifier over MFCC grids.
#[async_trait]
pub trait SpectrogramModel: Send + Sync {
    /// Sigmoid output for a feature grid: the probability it is fake.
    async fn score(&self, features: &MfccGrid) -> Result<f64>;

    fn backend(&self) -> &'static str;
}

#[async_trait]
impl<T: FaceModel + ?Sized> FaceModel for Arc<T> {
    async fn detect_face(&self, image: &RgbImage) -> Result<Option<RgbImage>> {
        (**self).detect_face(image).await
    }

    async fn score(&self, face: &RgbImage) -> Result<f64> {
        (**self).score(face).await
    }

    fn backend(&self) -> &'static str {
        (**self).backend()
    }
}

#[async_trait]
impl<T: SpectrogramModel + ?Sized> SpectrogramModel for Arc<T> {
    async fn score(&self, features: &MfccGrid) -> Result<f64> {
        (**self).score(features).await
    }

    fn backend(&self) -> &'static str {
        (**self).backend()
    }
}

/// Classify one unit into a label and a confidence.
#[async_trait]
pub trait UnitClassifier: Send + Sync {
    type Unit: Send + Sync + ?Sized;

    async fn classify(&self, unit: &Self::Unit) -> Result<ClassificationResult>;
}

/// Face-based variant: no face is a terminal outcome, not an error.
pub struct FaceClassifier<M> {
    model: M,
}

impl<M: FaceModel> FaceClassifier<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

#[async_trait]
impl<M: FaceModel> UnitClassifier for FaceClassifier<M> {
    type Unit = RgbImage;

    async fn classify(&self, image: &RgbImage) -> Result<ClassificationResult> {
        let Some(face) = self.model.detect_face(image).await? else {
            debug!("No face detected");
            return Ok(ClassificationResult::no_face());
        };
        let score = checked_score(self.model.score(&face).await?)?;
        Ok(ClassificationResult::from_score(score))
    }
}

/// Spectrogram variant over precomputed MFCC grids.
pub struct AudioClassifier<M> {
    model: M,
}

impl<M: SpectrogramModel> AudioClassifier<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

#[async_trait]
impl<M: SpectrogramModel> UnitClassifier for AudioClassifier<M> {
    type Unit = MfccGrid;

    async fn classify(&self, features: &MfccGrid) -> Result<ClassificationResult> {
        let score = checked_score(self.model.score(features).await?)?;
        Ok(ClassificationResult::from_score(score))
    }
}

/// Reject model outputs that are not a probability.
pub(crate) fn checked_score(score: f64) -> Result<f64> {
    if score.is_finite() && (0.0..=1.0).contains(&score) {
        Ok(score)
    } else {
        Err(DeeptraceError::Inference(format!(
            "Model returned {score}, expected a value in [0, 1]"
        )))
    }
}
