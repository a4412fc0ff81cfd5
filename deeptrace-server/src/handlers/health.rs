//! Health check handlers
//!
//! Provides health and readiness endpoints for monitoring and orchestration.

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::handlers::AppState;

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status: "healthy" or "degraded"
    #[schema(example = "healthy")]
    pub status: &'static str,
    /// Server version from Cargo.toml
    #[schema(example = "0.1.0")]
    pub version: &'static str,
    /// Face model backend ("remote" or "mock")
    #[schema(example = "remote")]
    pub face_model: &'static str,
    /// Spectrogram model backend ("remote" or "mock")
    #[schema(example = "remote")]
    pub audio_model: &'static str,
    /// Record store backend ("sqlite" or "memory")
    #[schema(example = "sqlite")]
    pub record_store: &'static str,
    /// Whether the record store answered a liveness check
    pub record_store_available: bool,
    /// Service name
    pub service: &'static str,
}

/// GET /health - Health check endpoint
///
/// Returns JSON with service status, version, model backends and record
/// store reachability. Used for monitoring and load balancer health checks.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service status", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let records = state.records();
    let record_store_available = records.check_health().await.is_ok();
    let (face_model, audio_model) = state.detector.backends();

    let status = if record_store_available {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        face_model,
        audio_model,
        record_store: records.backend(),
        record_store_available,
        service: "deeptrace-server",
    })
}

/// Readiness response for Kubernetes
#[derive(Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Whether the service is ready to accept traffic
    pub ready: bool,
}

/// GET /ready - Kubernetes readiness check
///
/// Returns 200 once the record store is reachable, 503 otherwise.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Ready to accept traffic", body = ReadyResponse),
        (status = 503, description = "Record store unreachable")
    )
)]
pub async fn ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, ApiError> {
    state
        .records()
        .check_health()
        .await
        .map_err(|e| ApiError::service_unavailable(format!("Record store unreachable: {e}")))?;
    Ok(Json(ReadyResponse { ready: true }))
}
