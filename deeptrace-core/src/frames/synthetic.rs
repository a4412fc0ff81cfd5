//! In-memory videos for tests and demos.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::{Rgb, RgbImage};

use super::{Frame, VideoOpener, VideoSource};
use crate::error::Result;

/// In-memory video whose frame `i` is a 32x16 raster filled with `i % 256`.
///
/// Reads of indices listed in `failing` return `None`. `released` flips to
/// `true` when the handle is dropped.
#[derive(Debug)]
pub struct SyntheticVideo {
    pub frames: usize,
    pub failing: Vec<usize>,
    pub position: usize,
    pub released: Arc<AtomicBool>,
}

impl SyntheticVideo {
    pub fn new(frames: usize) -> Self {
        Self {
            frames,
            failing: Vec::new(),
            position: 0,
            released: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl VideoSource for SyntheticVideo {
    fn frame_count(&self) -> usize {
        self.frames
    }

    fn seek(&mut self, index: usize) -> Result<()> {
        self.position = index;
        Ok(())
    }

    fn read_frame(&mut self) -> Option<Frame> {
        let index = self.position;
        self.position += 1;
        if index >= self.frames || self.failing.contains(&index) {
            return None;
        }
        let value = (index % 256) as u8;
        Some(RgbImage::from_pixel(32, 16, Rgb([value, value, value])))
    }
}

impl Drop for SyntheticVideo {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Opens every path as a [`SyntheticVideo`] of `frames` frames, ignoring the
/// file contents.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticOpener {
    pub frames: usize,
}

impl SyntheticOpener {
    pub fn new(frames: usize) -> Self {
        Self { frames }
    }
}

impl VideoOpener for SyntheticOpener {
    fn open(&self, _path: &Path) -> Result<Box<dyn VideoSource>> {
        Ok(Box::new(SyntheticVideo::new(self.frames)))
    }
}
