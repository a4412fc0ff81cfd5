//! Media kinds, classification labels and per-unit results.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DeeptraceError, Result};

/// Sigmoid outputs at or above this value are labelled manipulated.
pub const FAKE_THRESHOLD: f64 = 0.5;

/// Kind of uploaded media, which selects the classifier path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
}

impl MediaKind {
    /// Every kind, in the order upload fields are inspected.
    pub const ALL: [MediaKind; 3] = [MediaKind::Image, MediaKind::Audio, MediaKind::Video];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    /// Parse a declared kind ("image", "audio" or "video", case-insensitive).
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            other => Err(DeeptraceError::InvalidInput(format!(
                "Unknown media kind '{other}' (expected image, audio or video)"
            ))),
        }
    }

    /// Detect the media kind from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|s| s.to_lowercase())
            .as_deref()
        {
            Some("jpg" | "jpeg" | "png" | "gif" | "bmp" | "webp") => Some(Self::Image),
            Some("mp4" | "mov" | "avi" | "mkv" | "webm" | "flv" | "wmv") => Some(Self::Video),
            Some("mp3" | "wav" | "flac" | "aac" | "ogg" | "m4a") => Some(Self::Audio),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal classification label of a unit or of a whole upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "real")]
    Authentic,
    #[serde(rename = "fake")]
    Manipulated,
    #[serde(rename = "no_face_detected")]
    NoFaceDetected,
    #[serde(rename = "error")]
    Error,
}

impl Label {
    /// Wire name, also stored in the record `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authentic => "real",
            Self::Manipulated => "fake",
            Self::NoFaceDetected => "no_face_detected",
            Self::Error => "error",
        }
    }

    /// Two-way labelling of a raw sigmoid output.
    pub fn from_score(score: f64) -> Self {
        if score < FAKE_THRESHOLD {
            Self::Authentic
        } else {
            Self::Manipulated
        }
    }

    /// Rank used to break exact ties when aggregating: higher wins.
    ///
    /// The least trusting label wins a tie, so an authentic verdict needs a
    /// strict plurality.
    pub(crate) fn tie_rank(&self) -> u8 {
        match self {
            Self::Manipulated => 3,
            Self::Error => 2,
            Self::NoFaceDetected => 1,
            Self::Authentic => 0,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying one unit (image, audio clip or video frame).
///
/// `confidence` is the classifier's raw score, i.e. the probability of the
/// unit being fake, not the confidence of the assigned label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    #[serde(rename = "prediction")]
    pub label: Label,
    pub confidence: f64,
}

impl ClassificationResult {
    pub fn new(label: Label, confidence: f64) -> Self {
        Self { label, confidence }
    }

    /// Result for a raw sigmoid output.
    pub fn from_score(score: f64) -> Self {
        Self::new(Label::from_score(score), score)
    }

    pub fn no_face() -> Self {
        Self::new(Label::NoFaceDetected, 0.0)
    }

    /// Placeholder for a unit whose classification failed.
    pub fn error() -> Self {
        Self::new(Label::Error, 0.0)
    }
}

/// Single verdict for a whole upload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    #[serde(rename = "prediction")]
    pub label: Label,
    pub confidence: f64,
}

impl AggregatedResult {
    pub fn is_authentic(&self) -> bool {
        self.label == Label::Authentic
    }
}

impl From<ClassificationResult> for AggregatedResult {
    fn from(result: ClassificationResult) -> Self {
        Self {
            label: result.label,
            confidence: result.confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_inclusive_for_fake() {
        assert_eq!(Label::from_score(0.0), Label::Authentic);
        assert_eq!(Label::from_score(0.4999), Label::Authentic);
        assert_eq!(Label::from_score(0.5), Label::Manipulated);
        assert_eq!(Label::from_score(1.0), Label::Manipulated);
    }

    #[test]
    fn test_label_wire_names() {
        assert_eq!(serde_json::to_string(&Label::Authentic).unwrap(), "\"real\"");
        assert_eq!(serde_json::to_string(&Label::Manipulated).unwrap(), "\"fake\"");
        assert_eq!(
            serde_json::to_string(&Label::NoFaceDetected).unwrap(),
            "\"no_face_detected\""
        );
        assert_eq!(Label::Error.as_str(), "error");
    }

    #[test]
    fn test_media_kind_parse() {
        assert_eq!(MediaKind::parse("Video").unwrap(), MediaKind::Video);
        assert_eq!(MediaKind::parse(" audio ").unwrap(), MediaKind::Audio);
        assert!(MediaKind::parse("document").is_err());
    }

    #[test]
    fn test_media_kind_from_path() {
        assert_eq!(MediaKind::from_path(Path::new("a.JPG")), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_path(Path::new("clip.mp4")), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_path(Path::new("voice.wav")), Some(MediaKind::Audio));
        assert_eq!(MediaKind::from_path(Path::new("notes.txt")), None);
        assert_eq!(MediaKind::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_no_face_has_zero_confidence() {
        let result = ClassificationResult::no_face();
        assert_eq!(result.label, Label::NoFaceDetected);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_score_reaches_the_wire_unchanged() {
        let result = ClassificationResult::from_score(0.2);
        assert_eq!(result.confidence, 0.2);
        assert_eq!(
            serde_json::to_string(&result).unwrap(),
            r#"{"prediction":"real","confidence":0.2}"#
        );
    }
}
