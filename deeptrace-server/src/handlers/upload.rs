//! Upload classification handler

use axum::{
    extract::{Multipart, State},
    Json,
};
use deeptrace_core::{pipeline, ClassificationResult, Label, PipelineOutcome, StagedUpload};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::handlers::AppState;
use crate::multipart::MultipartFields;

/// Verdict for a single sampled video frame
#[derive(Debug, Serialize, ToSchema)]
pub struct FramePrediction {
    /// real, fake, no_face_detected or error
    #[schema(example = "real")]
    pub prediction: String,
    #[schema(example = 0.12)]
    pub confidence: f64,
}

impl From<&ClassificationResult> for FramePrediction {
    fn from(result: &ClassificationResult) -> Self {
        Self {
            prediction: result.label.as_str().to_string(),
            confidence: result.confidence,
        }
    }
}

/// Response for a classified upload
#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    /// Aggregated verdict: real, fake, no_face_detected or error
    #[schema(example = "real")]
    pub prediction: String,
    /// Aggregated probability that the media is manipulated
    #[schema(example = 0.18)]
    pub confidence: f64,
    /// Path of the metadata sidecar, present only when the media was kept
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "media/interview.mp4.json")]
    pub metadata_file: Option<String>,
    /// Why the media was not kept
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Per-frame verdicts for video uploads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames: Option<Vec<FramePrediction>>,
}

fn discard_message(label: Label) -> &'static str {
    match label {
        Label::Manipulated => "Deepfake detected, file not saved.",
        Label::NoFaceDetected => "No face detected, file not saved.",
        Label::Authentic | Label::Error => "Classification inconclusive, file not saved.",
    }
}

impl From<PipelineOutcome> for UploadResponse {
    fn from(outcome: PipelineOutcome) -> Self {
        let result = &outcome.classification.result;
        let (metadata_file, message) = match &outcome.commit.saved {
            Some(saved) => (Some(saved.metadata_path.display().to_string()), None),
            None => (None, Some(discard_message(result.label).to_string())),
        };
        Self {
            prediction: result.label.as_str().to_string(),
            confidence: result.confidence,
            metadata_file,
            message,
            frames: outcome
                .classification
                .frames
                .as_ref()
                .map(|frames| frames.iter().map(FramePrediction::from).collect()),
        }
    }
}

/// POST /upload - Classify an uploaded image, audio clip or video
///
/// Accepts multipart/form-data with exactly one of:
/// - image: a still image with a face
/// - audio: a speech recording
/// - video: a video with a face on screen
///
/// Every classified upload is logged as a record. Only authentic media is
/// copied to the media directory alongside a metadata sidecar.
#[utoipa::path(
    post,
    path = "/upload",
    tag = "Detection",
    request_body(
        content_type = "multipart/form-data",
        description = "One media file under a field named `image`, `audio` or `video`"
    ),
    responses(
        (status = 200, description = "Upload classified", body = UploadResponse),
        (status = 400, description = "No file, empty filename, or undecodable media"),
        (status = 413, description = "File exceeds the upload limit"),
        (status = 422, description = "Media could not be decoded by ffmpeg"),
        (status = 502, description = "Model inference failed"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let fields = MultipartFields::parse(&mut multipart).await?;
    let (kind, file) = fields.require_upload(state.max_file_size)?;
    // require_upload rejects a missing filename
    let filename = file.file_name.as_deref().unwrap_or_default();

    tracing::info!(
        kind = %kind,
        filename = %filename,
        size = file.data.len(),
        "Upload received"
    );

    let upload = StagedUpload::write(&state.upload_dir, filename, kind, &file.data)?;
    let outcome = pipeline::run(&state.detector, &state.gate, &upload).await?;

    tracing::info!(
        kind = %kind,
        prediction = outcome.classification.result.label.as_str(),
        confidence = outcome.classification.result.confidence,
        persisted = outcome.commit.persisted(),
        "Upload classified"
    );

    Ok(Json(UploadResponse::from(outcome)))
}
