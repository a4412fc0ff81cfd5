//! Classification record listing handler

use axum::{extract::State, Json};
use deeptrace_core::ClassificationRecord;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::handlers::AppState;

/// One row of the classification log
#[derive(Debug, Serialize, ToSchema)]
pub struct PredictionRecord {
    #[schema(example = 42)]
    pub id: i64,
    /// Local date of the request
    #[schema(example = "2026-03-14")]
    pub date: String,
    /// Local time of the request
    #[schema(example = "09:26:53")]
    pub time: String,
    #[schema(example = "instagram")]
    pub platform: String,
    /// Verdict: real, fake, no_face_detected or error
    #[schema(example = "fake")]
    pub status: String,
    /// Aggregated confidence, rounded to 2 decimals
    #[schema(example = 0.87)]
    pub confidence: f64,
    /// image, audio or video
    #[schema(example = "image")]
    pub media_format: String,
}

impl From<ClassificationRecord> for PredictionRecord {
    fn from(record: ClassificationRecord) -> Self {
        Self {
            id: record.id,
            date: record.date,
            time: record.time,
            platform: record.platform,
            status: record.status,
            confidence: record.confidence,
            media_format: record.media_format,
        }
    }
}

/// List every classification record, oldest first
#[utoipa::path(
    get,
    path = "/api/predictions",
    tag = "Records",
    responses(
        (status = 200, description = "All classification records", body = [PredictionRecord]),
        (status = 500, description = "Record store error")
    )
)]
pub async fn predictions_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<PredictionRecord>>, ApiError> {
    let records = state.records().list_all().await?;
    Ok(Json(records.into_iter().map(PredictionRecord::from).collect()))
}
