//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use deeptrace_core::DeeptraceError;
use thiserror::Error;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Upload exceeds the per-file limit
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Internal error - unexpected server-side failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Service unavailable - required collaborator is not configured or available
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Pipeline error - error from the detection library
    #[error("Detection error: {0}")]
    Detection(#[from] DeeptraceError),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::PayloadTooLarge(message.into())
    }

    /// Create an internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a service unavailable error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Detection(ref e) => match e {
                // Client-provided invalid input → 400
                DeeptraceError::InvalidInput(_) | DeeptraceError::Decode(_) => {
                    StatusCode::BAD_REQUEST
                }

                // Model collaborator failures → 502
                DeeptraceError::Inference(_) => StatusCode::BAD_GATEWAY,
                DeeptraceError::HttpError(_) => StatusCode::BAD_GATEWAY,

                // Media the decoders could not process → 422
                DeeptraceError::ExternalTool { .. } | DeeptraceError::FeatureExtraction(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }

                // Internal processing failures → 500
                DeeptraceError::Persistence(_)
                | DeeptraceError::RecordStore(_)
                | DeeptraceError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Get the error code for programmatic error handling
    fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::PayloadTooLarge(_) => "FILE_TOO_LARGE",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Detection(ref e) => match e {
                DeeptraceError::InvalidInput(_) => "INVALID_INPUT",
                DeeptraceError::Decode(_) => "INVALID_MEDIA",
                DeeptraceError::Inference(_) => "INFERENCE_FAILED",
                DeeptraceError::HttpError(_) => "UPSTREAM_ERROR",
                DeeptraceError::ExternalTool { .. } => "DECODER_FAILED",
                DeeptraceError::FeatureExtraction(_) => "FEATURE_EXTRACTION_FAILED",
                DeeptraceError::Persistence(_) => "PERSISTENCE_FAILED",
                DeeptraceError::RecordStore(_) => "RECORD_STORE_ERROR",
                DeeptraceError::Io(_) => "IO_ERROR",
            },
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            Self::Detection(ref e) => match e {
                DeeptraceError::InvalidInput(msg) => msg.clone(),
                DeeptraceError::Decode(_) => "Uploaded media could not be decoded".to_string(),
                DeeptraceError::Inference(_) => "Model inference failed".to_string(),
                DeeptraceError::HttpError(_) => "Upstream service error".to_string(),
                DeeptraceError::ExternalTool { tool, .. } => {
                    format!("Media could not be processed by {tool}")
                }
                DeeptraceError::FeatureExtraction(_) => {
                    "Audio features could not be extracted".to_string()
                }
                DeeptraceError::Persistence(_) => "Failed to save media".to_string(),
                DeeptraceError::RecordStore(_) => "Record store unavailable".to_string(),
                DeeptraceError::Io(_) => "Internal I/O error".to_string(),
            },
            // For other errors, use the Display message
            _ => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::Internal(_) => "internal",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::Detection(_) => "detection",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        // Log based on severity, always including internal details
        if status.is_server_error() {
            tracing::error!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                client_message = %client_message,
                "Server error"
            );
        } else {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Client error"
            );
        }

        // All error responses include a `code` field for programmatic error handling
        let body = serde_json::json!({
            "error": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}
