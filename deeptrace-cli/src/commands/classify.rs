//! Classify command implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use deeptrace_core::{
    Classification, Detector, FaceModel, Label, MediaKind, MockFaceModel, MockSpectrogramModel,
    OffsetSource, RandomOffset, RemoteModel, RemoteModelConfig, SeededOffset, SpectrogramModel,
};
use tracing::{debug, info};

use crate::exit_codes::CliError;

pub struct ClassifyOptions {
    pub kind: Option<MediaKind>,
    pub inference_url: Option<String>,
    /// Use mock models returning this score
    pub mock_score: Option<f64>,
    pub seed: Option<u64>,
    pub json: bool,
    pub quiet: bool,
}

fn build_detector(options: &ClassifyOptions) -> Result<Detector> {
    let (face, spectrogram): (Arc<dyn FaceModel>, Arc<dyn SpectrogramModel>) =
        match (options.mock_score, &options.inference_url) {
            (Some(score), _) => {
                debug!(score, "Using mock models");
                let face: Arc<dyn FaceModel> = Arc::new(MockFaceModel::with_score(score));
                let audio: Arc<dyn SpectrogramModel> =
                    Arc::new(MockSpectrogramModel::with_score(score));
                (face, audio)
            }
            (None, Some(url)) => {
                let model = Arc::new(
                    RemoteModel::new(RemoteModelConfig::new(url.clone()))
                        .context("Invalid inference service URL")?,
                );
                let face: Arc<dyn FaceModel> = model.clone();
                let audio: Arc<dyn SpectrogramModel> = model;
                (face, audio)
            }
            (None, None) => {
                return Err(CliError::Unavailable(
                    "No inference service configured (set INFERENCE_URL or pass --mock)".into(),
                )
                .into())
            }
        };

    let offsets: Arc<dyn OffsetSource> = match options.seed {
        Some(seed) => Arc::new(SeededOffset::new(seed)),
        None => Arc::new(RandomOffset),
    };

    Ok(Detector::builder(face, spectrogram).offsets(offsets).build())
}

fn banner(label: Label) -> ColoredString {
    match label {
        Label::Authentic => "AUTHENTIC".green().bold(),
        Label::Manipulated => "MANIPULATED".red().bold(),
        Label::NoFaceDetected => "NO FACE DETECTED".yellow().bold(),
        Label::Error => "INCONCLUSIVE".yellow().bold(),
    }
}

fn print_report(file: &Path, kind: MediaKind, classification: &Classification) {
    let result = &classification.result;
    println!();
    println!("   {}", banner(result.label));
    println!();
    println!("   {} {}", "File:".dimmed(), file.display());
    println!("   {} {}", "Media kind:".dimmed(), kind);
    println!("   {} {}", "Prediction:".dimmed(), result.label);
    println!("   {} {:.4}", "P(fake):".dimmed(), result.confidence);

    if let Some(frames) = &classification.frames {
        println!("   {}", "Frames:".dimmed());
        for (i, frame) in frames.iter().enumerate() {
            println!("     #{:<3} {:<17} {:.4}", i, frame.label, frame.confidence);
        }
    }
}

fn to_json(file: &Path, kind: MediaKind, classification: &Classification) -> serde_json::Value {
    let mut value = serde_json::json!({
        "file": file.display().to_string(),
        "media_format": kind.as_str(),
        "prediction": classification.result.label.as_str(),
        "confidence": classification.result.confidence,
    });
    if let Some(frames) = &classification.frames {
        value["frames"] = frames
            .iter()
            .map(|f| serde_json::json!({"prediction": f.label.as_str(), "confidence": f.confidence}))
            .collect();
    }
    value
}

/// Execute the classify command.
///
/// Runs the classify phase only: nothing is recorded or persisted.
pub async fn execute(file: PathBuf, options: ClassifyOptions) -> Result<()> {
    let metadata = std::fs::metadata(&file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;

    let kind = match options.kind.or_else(|| MediaKind::from_path(&file)) {
        Some(kind) => kind,
        None => {
            return Err(CliError::Usage(format!(
                "Cannot detect media kind of {}; pass --kind image|audio|video",
                file.display()
            ))
            .into())
        }
    };

    info!(path = %file.display(), bytes = metadata.len(), kind = %kind, "Classifying file");

    let detector = build_detector(&options)?;
    let classification = detector
        .classify(kind, &file)
        .await
        .with_context(|| format!("Classification of {} failed", file.display()))?;

    if options.json {
        println!("{}", to_json(&file, kind, &classification));
    } else if !options.quiet {
        print_report(&file, kind, &classification);
    }

    if classification.result.label == Label::Manipulated {
        return Err(CliError::Manipulated.into());
    }
    Ok(())
}
