//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod health;
pub mod predictions;
pub mod upload;

pub use crate::state::AppState;
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use predictions::{predictions_handler, PredictionRecord};
pub use upload::{upload_handler, FramePrediction, UploadResponse};
