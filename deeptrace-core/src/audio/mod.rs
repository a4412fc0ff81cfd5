//! Audio decoding and spectral feature extraction.
//!
//! Audio clips are reduced to a fixed 40 x 500 MFCC grid: mono 16 kHz
//! samples, 40 coefficients per STFT frame, zero-padded or truncated to 500
//! frames.

pub mod mfcc;

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DeeptraceError, Result};

/// Sample rate audio is resampled to before feature extraction.
pub const SAMPLE_RATE: u32 = 16_000;

/// Coefficients per frame.
pub const N_MFCC: usize = 40;

/// Frames per grid.
pub const MAX_FRAMES: usize = 500;

/// Fixed-shape MFCC feature grid, `N_MFCC` rows of `MAX_FRAMES` columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MfccGrid {
    rows: Vec<Vec<f32>>,
}

impl MfccGrid {
    /// Fit a coefficient matrix to the fixed grid shape.
    ///
    /// Rows beyond `N_MFCC` are dropped; missing rows and columns are zeros,
    /// extra columns are truncated.
    pub fn fit(coefficients: Vec<Vec<f32>>) -> Self {
        let mut rows: Vec<Vec<f32>> = coefficients
            .into_iter()
            .take(N_MFCC)
            .map(|mut row| {
                row.resize(MAX_FRAMES, 0.0);
                row
            })
            .collect();
        rows.resize(N_MFCC, vec![0.0; MAX_FRAMES]);
        Self { rows }
    }

    pub fn zeros() -> Self {
        Self::fit(Vec::new())
    }

    /// `(rows, columns)`, always `(N_MFCC, MAX_FRAMES)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.rows.first().map_or(0, Vec::len))
    }

    pub fn rows(&self) -> &[Vec<f32>] {
        &self.rows
    }
}

/// Compute the MFCC grid for mono samples at [`SAMPLE_RATE`].
///
/// Only the first [`MAX_FRAMES`] frames are materialised. The decoded
/// samples themselves are held in full (4 bytes each, about 230 MB for an
/// hour of audio).
pub fn extract_features(samples: &[f32]) -> Result<MfccGrid> {
    if samples.iter().any(|s| !s.is_finite()) {
        return Err(DeeptraceError::FeatureExtraction(
            "Audio contains non-finite samples".into(),
        ));
    }
    let coefficients = mfcc::mfcc_limited(samples, SAMPLE_RATE, N_MFCC, MAX_FRAMES);
    let frames = coefficients.first().map_or(0, Vec::len);
    debug!(samples = samples.len(), frames, "Extracted MFCC features");
    Ok(MfccGrid::fit(coefficients))
}

/// Decodes an audio file to mono samples at [`SAMPLE_RATE`].
pub trait AudioDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<Vec<f32>>;
}

/// Decodes audio with an `ffmpeg` child process writing raw f32le samples.
#[derive(Debug, Clone)]
pub struct FfmpegAudioDecoder {
    ffmpeg: PathBuf,
}

impl Default for FfmpegAudioDecoder {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }
}

impl FfmpegAudioDecoder {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }
}

impl AudioDecoder for FfmpegAudioDecoder {
    fn decode(&self, path: &Path) -> Result<Vec<f32>> {
        let rate = SAMPLE_RATE.to_string();
        let output = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-vn", "-ac", "1", "-ar", rate.as_str(), "-f", "f32le", "pipe:1"])
            .output()
            .map_err(|e| DeeptraceError::ExternalTool {
                tool: "ffmpeg",
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(DeeptraceError::ExternalTool {
                tool: "ffmpeg",
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let samples: Vec<f32> = output
            .stdout
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        debug!(path = %path.display(), samples = samples.len(), "Decoded audio");
        Ok(samples)
    }
}
