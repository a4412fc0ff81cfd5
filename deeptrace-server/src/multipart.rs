//! Multipart form parsing helpers
//!
//! Uploads carry one file under a field named after its media kind:
//! `image`, `audio` or `video`. Other fields are ignored.

use std::collections::HashMap;

use axum::extract::Multipart;
use deeptrace_core::MediaKind;

use crate::error::ApiError;
use crate::validation::{validate_content_type, validate_file_size};

/// Represents a file uploaded via multipart form
#[derive(Debug, Clone)]
pub struct FileField {
    /// File data bytes
    pub data: Vec<u8>,
    /// Content-Type from the multipart field (if provided)
    pub content_type: Option<String>,
    /// Original filename from the multipart field (if provided)
    pub file_name: Option<String>,
}

/// Media files found in a multipart request, keyed by kind
#[derive(Debug, Default)]
pub struct MultipartFields {
    files: HashMap<MediaKind, FileField>,
}

impl MultipartFields {
    /// Parse all media fields from a multipart request
    ///
    /// Content-Type is checked against the field name. Size limits are checked
    /// later by [`require_upload`](Self::require_upload), so an empty field is
    /// reported the same way as a missing filename.
    pub async fn parse(multipart: &mut Multipart) -> Result<Self, ApiError> {
        let mut files = HashMap::new();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to parse multipart: {}", e)))?
        {
            let Some(kind) = field.name().and_then(|n| MediaKind::parse(n).ok()) else {
                continue;
            };

            let content_type = field.content_type().map(|s| s.to_string());
            validate_content_type(kind, content_type.as_deref())?;
            let file_name = field.file_name().map(|s| s.to_string());

            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed to read file: {}", e)))?
                .to_vec();

            files.insert(
                kind,
                FileField {
                    data,
                    content_type,
                    file_name,
                },
            );
        }

        Ok(Self { files })
    }

    /// Pick the upload to classify: the first of `image`, `audio`, `video`
    /// present in the form.
    ///
    /// # Errors
    ///
    /// 400 when no media field is present, the filename is empty, or the file
    /// is empty; 413 when the file exceeds `max_file_size`.
    pub fn require_upload(&self, max_file_size: usize) -> Result<(MediaKind, &FileField), ApiError> {
        let (kind, file) = MediaKind::ALL
            .iter()
            .find_map(|kind| self.files.get(kind).map(|f| (*kind, f)))
            .ok_or_else(|| ApiError::bad_request("No valid file provided"))?;

        if file.file_name.as_deref().map_or(true, str::is_empty) {
            return Err(ApiError::bad_request("No selected file"));
        }
        validate_file_size(file.data.len(), max_file_size)?;
        Ok((kind, file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn file(name: Option<&str>, data: &[u8]) -> FileField {
        FileField {
            data: data.to_vec(),
            content_type: None,
            file_name: name.map(str::to_string),
        }
    }

    #[test]
    fn test_require_upload_missing() {
        let fields = MultipartFields::default();
        let err = fields.require_upload(1024).unwrap_err();
        assert_eq!(err.to_string(), "Bad request: No valid file provided");
    }

    #[test]
    fn test_require_upload_prefers_image() {
        let mut fields = MultipartFields::default();
        fields.files.insert(MediaKind::Video, file(Some("v.mp4"), b"v"));
        fields.files.insert(MediaKind::Image, file(Some("i.png"), b"i"));
        let (kind, chosen) = fields.require_upload(1024).unwrap();
        assert_eq!(kind, MediaKind::Image);
        assert_eq!(chosen.data, b"i");
    }

    #[test]
    fn test_require_upload_empty_filename() {
        let mut fields = MultipartFields::default();
        fields.files.insert(MediaKind::Audio, file(Some(""), b"a"));
        let err = fields.require_upload(1024).unwrap_err();
        assert_eq!(err.to_string(), "Bad request: No selected file");

        fields.files.insert(MediaKind::Audio, file(None, b"a"));
        assert!(fields.require_upload(1024).is_err());
    }

    #[test]
    fn test_require_upload_size_limits() {
        let mut fields = MultipartFields::default();
        fields.files.insert(MediaKind::Image, file(Some("i.png"), b""));
        assert_eq!(
            fields.require_upload(1024).unwrap_err().status_code(),
            StatusCode::BAD_REQUEST
        );

        fields.files.insert(MediaKind::Image, file(Some("i.png"), &[0u8; 2048]));
        assert_eq!(
            fields.require_upload(1024).unwrap_err().status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }
}
