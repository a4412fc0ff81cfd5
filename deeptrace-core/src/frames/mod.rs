//! Frame sampling from video containers.
//!
//! The sampler picks a start offset, then takes `n_frames` frames at a fixed
//! stride, resizing each one to a square output raster. Short or failing
//! reads are padded with blank frames so the output length is always exactly
//! `n_frames`.
//!
//! The start offset is drawn from an injected [`OffsetSource`]. With
//! [`RandomOffset`] the choice is non-deterministic and differs between runs;
//! use [`SeededOffset`] or [`FixedOffset`] when the offset must be pinned.

mod ffmpeg;
mod synthetic;

pub use ffmpeg::{FfmpegOpener, FfmpegVideo};
pub use synthetic::{SyntheticOpener, SyntheticVideo};

use std::path::Path;
use std::sync::{Arc, Mutex};

use image::imageops::{self, FilterType};
use image::RgbImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::error::Result;

/// A decoded RGB raster.
pub type Frame = RgbImage;

/// Default number of frames sampled per video.
pub const DEFAULT_SAMPLE_FRAMES: usize = 3;

/// Default distance, in source frames, between two sampled frames.
pub const DEFAULT_FRAME_STRIDE: usize = 15;

/// Default edge length of sampled frames.
pub const DEFAULT_FRAME_SIZE: u32 = 224;

/// An open video handle read sequentially from a seek position.
///
/// Dropping the handle releases the underlying decoder.
pub trait VideoSource: Send {
    /// Number of frames in the container (0 when unknown).
    fn frame_count(&self) -> usize;

    /// Position the handle so that the next [`read_frame`](Self::read_frame)
    /// returns frame `index`.
    fn seek(&mut self, index: usize) -> Result<()>;

    /// Read the next frame, `None` at end of stream or on a decode failure.
    fn read_frame(&mut self) -> Option<Frame>;
}

/// Opens video files into [`VideoSource`] handles.
pub trait VideoOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>>;
}

/// Chooses the start offset of a sample.
pub trait OffsetSource: Send + Sync {
    /// Pick an offset in `0..=max_start`.
    fn pick(&self, max_start: usize) -> usize;
}

impl<T: OffsetSource + ?Sized> OffsetSource for Arc<T> {
    fn pick(&self, max_start: usize) -> usize {
        (**self).pick(max_start)
    }
}

/// Uniform offset from the thread-local RNG. Not reproducible.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomOffset;

impl OffsetSource for RandomOffset {
    fn pick(&self, max_start: usize) -> usize {
        rand::rng().random_range(0..=max_start)
    }
}

/// Uniform offset from a seeded RNG; the same seed yields the same sequence.
pub struct SeededOffset {
    rng: Mutex<StdRng>,
}

impl SeededOffset {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl OffsetSource for SeededOffset {
    fn pick(&self, max_start: usize) -> usize {
        match self.rng.lock() {
            Ok(mut rng) => rng.random_range(0..=max_start),
            Err(poisoned) => poisoned.into_inner().random_range(0..=max_start),
        }
    }
}

/// Always the same offset, clamped to the valid range.
#[derive(Debug, Clone, Copy)]
pub struct FixedOffset(pub usize);

impl OffsetSource for FixedOffset {
    fn pick(&self, max_start: usize) -> usize {
        self.0.min(max_start)
    }
}

/// Sampling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Number of frames produced per video.
    pub n_frames: usize,
    /// Distance between two consecutive sampled frames.
    pub stride: usize,
    /// Output edge length in pixels.
    pub output_size: u32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            n_frames: DEFAULT_SAMPLE_FRAMES,
            stride: DEFAULT_FRAME_STRIDE,
            output_size: DEFAULT_FRAME_SIZE,
        }
    }
}

impl SamplerConfig {
    /// Minimum source length for a sample that does not run off the end.
    pub fn required_length(&self) -> usize {
        1 + self.n_frames.saturating_sub(1) * self.stride
    }
}

/// Extracts a fixed-length frame sequence from a video.
pub struct FrameSampler<O: OffsetSource> {
    config: SamplerConfig,
    offsets: O,
}

impl<O: OffsetSource> FrameSampler<O> {
    pub fn new(config: SamplerConfig, offsets: O) -> Self {
        let config = SamplerConfig {
            n_frames: config.n_frames.max(1),
            stride: config.stride.max(1),
            output_size: config.output_size.max(1),
        };
        Self { config, offsets }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Start offset for a source of `frame_count` frames.
    pub fn start_offset(&self, frame_count: usize) -> usize {
        let required = self.config.required_length();
        if required > frame_count {
            0
        } else {
            self.offsets.pick(frame_count - required)
        }
    }

    /// Sample exactly `n_frames` frames from `source`.
    ///
    /// Never fails: a failed first read yields an all-blank sequence and a
    /// failed later read yields a blank frame in that slot. The source is
    /// consumed and released before returning.
    pub fn sample(&self, mut source: Box<dyn VideoSource>) -> Vec<Frame> {
        let n = self.config.n_frames;
        let frame_count = source.frame_count();
        let start = self.start_offset(frame_count);
        debug!(frame_count, start, n_frames = n, stride = self.config.stride, "Sampling video");

        if let Err(e) = source.seek(start) {
            warn!(error = %e, start, "Seek failed, returning blank frames");
            return self.blank_sequence();
        }

        let first = match source.read_frame() {
            Some(frame) => self.format(&frame),
            None => {
                warn!(start, "First frame read failed, returning blank frames");
                return self.blank_sequence();
            }
        };

        let mut frames = Vec::with_capacity(n);
        frames.push(first);

        for slot in 1..n {
            let mut last = None;
            for _ in 0..self.config.stride {
                last = source.read_frame();
            }
            match last {
                Some(frame) => frames.push(self.format(&frame)),
                None => {
                    debug!(slot, "Frame read failed, substituting blank frame");
                    frames.push(self.blank());
                }
            }
        }

        frames
    }

    fn format(&self, frame: &Frame) -> Frame {
        let size = self.config.output_size;
        if frame.dimensions() == (size, size) {
            frame.clone()
        } else {
            imageops::resize(frame, size, size, FilterType::Triangle)
        }
    }

    fn blank(&self) -> Frame {
        RgbImage::new(self.config.output_size, self.config.output_size)
    }

    fn blank_sequence(&self) -> Vec<Frame> {
        (0..self.config.n_frames).map(|_| self.blank()).collect()
    }
}
