//! `ffprobe`/`ffmpeg` backed video decoding.
//!
//! Geometry and frame count come from `ffprobe`; frames are decoded by an
//! `ffmpeg` child process that writes raw RGB24 rasters to a pipe, starting
//! at the seek position.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use image::RgbImage;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{Frame, VideoOpener, VideoSource};
use crate::error::{DeeptraceError, Result};

/// Opens videos with the `ffmpeg` tool suite found on `PATH` (or the given
/// binaries).
#[derive(Debug, Clone)]
pub struct FfmpegOpener {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegOpener {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl FfmpegOpener {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }
}

impl VideoOpener for FfmpegOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>> {
        let video = FfmpegVideo::open(path, &self.ffmpeg, &self.ffprobe)?;
        Ok(Box::new(video))
    }
}

#[derive(Debug, Deserialize)]
struct StreamReport {
    #[serde(default)]
    streams: Vec<StreamEntry>,
}

#[derive(Debug, Deserialize)]
struct StreamEntry {
    width: Option<u32>,
    height: Option<u32>,
    nb_frames: Option<String>,
    nb_read_packets: Option<String>,
}

/// A video file decoded by an `ffmpeg` child process.
pub struct FfmpegVideo {
    path: PathBuf,
    ffmpeg: PathBuf,
    width: u32,
    height: u32,
    frame_count: usize,
    decoder: Option<Decoder>,
}

struct Decoder {
    child: Child,
    stdout: ChildStdout,
}

impl FfmpegVideo {
    /// Inspect `path` and prepare a handle positioned at frame 0.
    pub fn open(path: &Path, ffmpeg: &Path, ffprobe: &Path) -> Result<Self> {
        let output = Command::new(ffprobe)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-count_packets",
                "-show_entries",
                "stream=width,height,nb_frames,nb_read_packets",
                "-of",
                "json",
            ])
            .arg(path)
            .output()
            .map_err(|e| DeeptraceError::ExternalTool {
                tool: "ffprobe",
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(DeeptraceError::ExternalTool {
                tool: "ffprobe",
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let report: StreamReport = serde_json::from_slice(&output.stdout).map_err(|e| {
            DeeptraceError::Decode(format!("Unreadable ffprobe output: {e}"))
        })?;
        let stream = report
            .streams
            .into_iter()
            .next()
            .ok_or_else(|| DeeptraceError::Decode("No video stream found".into()))?;

        let (width, height) = match (stream.width, stream.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
            _ => return Err(DeeptraceError::Decode("Video stream has no geometry".into())),
        };

        let frame_count = stream
            .nb_frames
            .as_deref()
            .and_then(|n| n.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .or_else(|| {
                stream
                    .nb_read_packets
                    .as_deref()
                    .and_then(|n| n.parse::<usize>().ok())
            })
            .unwrap_or(0);

        debug!(path = %path.display(), width, height, frame_count, "Opened video");

        Ok(Self {
            path: path.to_path_buf(),
            ffmpeg: ffmpeg.to_path_buf(),
            width,
            height,
            frame_count,
            decoder: None,
        })
    }

    fn spawn_decoder(&self, start: usize) -> Result<Decoder> {
        let select = format!("select=gte(n\\,{start})");
        let mut child = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(&self.path)
            .args([
                "-map",
                "0:v:0",
                "-vf",
                select.as_str(),
                "-vsync",
                "0",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| DeeptraceError::ExternalTool {
                tool: "ffmpeg",
                message: e.to_string(),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| DeeptraceError::ExternalTool {
            tool: "ffmpeg",
            message: "decoder stdout unavailable".into(),
        })?;

        Ok(Decoder { child, stdout })
    }

    fn stop_decoder(&mut self) {
        if let Some(mut decoder) = self.decoder.take() {
            drop(decoder.stdout);
            if let Err(e) = decoder.child.kill() {
                debug!(error = %e, "ffmpeg already exited");
            }
            if let Err(e) = decoder.child.wait() {
                warn!(error = %e, "Failed to reap ffmpeg decoder");
            }
        }
    }
}

impl VideoSource for FfmpegVideo {
    fn frame_count(&self) -> usize {
        self.frame_count
    }

    fn seek(&mut self, index: usize) -> Result<()> {
        self.stop_decoder();
        self.decoder = Some(self.spawn_decoder(index)?);
        Ok(())
    }

    fn read_frame(&mut self) -> Option<Frame> {
        if self.decoder.is_none() {
            if let Err(e) = self.seek(0) {
                warn!(error = %e, "Failed to start ffmpeg decoder");
                return None;
            }
        }
        let decoder = self.decoder.as_mut()?;

        let mut buffer = vec![0u8; self.width as usize * self.height as usize * 3];
        match decoder.stdout.read_exact(&mut buffer) {
            Ok(()) => RgbImage::from_raw(self.width, self.height, buffer),
            Err(e) => {
                debug!(error = %e, "End of decoded stream");
                None
            }
        }
    }
}

impl Drop for FfmpegVideo {
    fn drop(&mut self) {
        self.stop_decoder();
    }
}
