//! Upload validation module
//!
//! Provides validation utilities for multipart file uploads.

use deeptrace_core::MediaKind;

use crate::error::ApiError;

/// Validates the Content-Type of an uploaded file against its form field
///
/// A field named `image` accepts `image/*`, `audio` accepts `audio/*` and
/// `video` accepts `video/*`. `application/octet-stream` and a missing
/// Content-Type are accepted for every field.
pub fn validate_content_type(kind: MediaKind, content_type: Option<&str>) -> Result<(), ApiError> {
    match content_type {
        Some(ct) => {
            let ct_lower = ct.to_lowercase();
            let prefix = format!("{}/", kind.as_str());
            if ct_lower.starts_with(&prefix) || ct_lower.starts_with("application/octet-stream") {
                Ok(())
            } else {
                Err(ApiError::bad_request(format!(
                    "Unsupported Content-Type for '{}' field: '{}'. Allowed types: {}*, application/octet-stream",
                    kind, ct, prefix
                )))
            }
        }
        // Allow missing Content-Type (treat as binary)
        None => Ok(()),
    }
}

/// Validates the size of an uploaded file
///
/// Returns an error if the file is empty or exceeds the maximum size.
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ApiError> {
    if size == 0 {
        Err(ApiError::bad_request("Uploaded file is empty"))
    } else if size > max_size {
        let max_mb = max_size / (1024 * 1024);
        let actual_mb = size / (1024 * 1024);
        Err(ApiError::payload_too_large(format!(
            "File too large: {} MB exceeds maximum of {} MB",
            actual_mb, max_mb
        )))
    } else {
        Ok(())
    }
}
