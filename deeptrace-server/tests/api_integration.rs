//! API integration tests for deeptrace-server (Detection API).
//!
//! These tests drive the router with realistic multipart requests, using
//! mock models, a synthetic video source and an in-memory record store.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use deeptrace_core::frames::SyntheticOpener;
use deeptrace_core::{
    ClassificationRecord, DeeptraceError, Detector, FixedOffset, MemoryRecordStore,
    MockFaceModel, MockSpectrogramModel, NewRecord, RecordStore,
};
use deeptrace_server::{create_router, create_router_with_config, AppState, Config};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "----TestBoundary7MA4YWxkTrZu0gW";

/// Helper to create a multipart body with one file field
fn create_upload_multipart(
    field: &str,
    filename: &str,
    content_type: &str,
    content: &[u8],
) -> (String, Vec<u8>) {
    let mut body = Vec::new();

    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(b"\r\n");

    // End boundary
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

fn png_bytes() -> Vec<u8> {
    let mut bytes = Vec::new();
    image::RgbImage::from_pixel(32, 32, image::Rgb([120, 90, 60]))
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

struct TestApp {
    router: Router,
    records: Arc<MemoryRecordStore>,
    uploads: TempDir,
    media: TempDir,
}

impl TestApp {
    fn new(face: MockFaceModel) -> Self {
        Self::with_config(face, Config::default())
    }

    fn with_config(face: MockFaceModel, mut config: Config) -> Self {
        let uploads = tempfile::tempdir().unwrap();
        let media = tempfile::tempdir().unwrap();
        config.upload_dir = uploads.path().to_path_buf();
        config.media_dir = media.path().to_path_buf();

        let detector = Detector::builder(
            Arc::new(face),
            Arc::new(MockSpectrogramModel::with_score(0.3)),
        )
        .video_opener(Arc::new(SyntheticOpener::new(120)))
        .offsets(Arc::new(FixedOffset(0)))
        .build();

        let records = Arc::new(MemoryRecordStore::new());
        let state = AppState::new(&config, detector, records.clone());

        Self {
            router: create_router_with_config(state, &config),
            records,
            uploads,
            media,
        }
    }

    fn media_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.media.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Staged uploads left behind in the upload directory
    fn staged_files(&self) -> Vec<String> {
        std::fs::read_dir(self.uploads.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    async fn upload(&self, content_type: String, body: Vec<u8>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/upload")
                    .header("content-type", content_type)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        read_json(response).await
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        read_json(response).await
    }
}

async fn read_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

// ============================================================================
// Health & Readiness Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new(MockFaceModel::with_score(0.2));
    let (status, json) = app.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "deeptrace-server");
    assert_eq!(json["face_model"], "mock");
    assert_eq!(json["record_store"], "memory");
    assert_eq!(json["record_store_available"], true);
}

#[tokio::test]
async fn test_ready_endpoint() {
    let app = TestApp::new(MockFaceModel::with_score(0.2));
    let (status, json) = app.get("/ready").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
}

struct UnreachableStore;

#[async_trait]
impl RecordStore for UnreachableStore {
    async fn append(&self, _record: NewRecord) -> deeptrace_core::Result<ClassificationRecord> {
        Err(DeeptraceError::RecordStore("connection refused".into()))
    }

    async fn list_all(&self) -> deeptrace_core::Result<Vec<ClassificationRecord>> {
        Err(DeeptraceError::RecordStore("connection refused".into()))
    }

    async fn check_health(&self) -> deeptrace_core::Result<()> {
        Err(DeeptraceError::RecordStore("connection refused".into()))
    }

    fn backend(&self) -> &'static str {
        "unreachable"
    }
}

#[tokio::test]
async fn test_ready_fails_without_record_store() {
    let config = Config::default();
    let detector = Detector::builder(
        Arc::new(MockFaceModel::with_score(0.2)),
        Arc::new(MockSpectrogramModel::with_score(0.2)),
    )
    .build();
    let router = create_router(AppState::new(&config, detector, Arc::new(UnreachableStore)));

    let response = router
        .clone()
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let (status, json) = read_json(
        router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "degraded");
}

// ============================================================================
// Upload Validation Tests
// ============================================================================

#[tokio::test]
async fn test_upload_without_media_field() {
    let app = TestApp::new(MockFaceModel::with_score(0.2));
    let (content_type, body) =
        create_upload_multipart("file", "face.png", "image/png", &png_bytes());

    let (status, json) = app.upload(content_type, body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Bad request: No valid file provided");
    assert_eq!(json["code"], "INVALID_INPUT");
    assert!(app.records.is_empty());
}

#[tokio::test]
async fn test_upload_with_empty_filename() {
    let app = TestApp::new(MockFaceModel::with_score(0.2));
    let (content_type, body) = create_upload_multipart("image", "", "image/png", &png_bytes());

    let (status, json) = app.upload(content_type, body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Bad request: No selected file");
}

#[tokio::test]
async fn test_upload_with_mismatched_content_type() {
    let app = TestApp::new(MockFaceModel::with_score(0.2));
    let (content_type, body) =
        create_upload_multipart("image", "face.png", "video/mp4", &png_bytes());

    let (status, _) = app.upload(content_type, body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_too_large() {
    let config = Config {
        max_file_size_mb: 1,
        ..Config::default()
    };
    let app = TestApp::with_config(MockFaceModel::with_score(0.2), config);
    let content = vec![0u8; 1024 * 1024 + 1];
    let (content_type, body) =
        create_upload_multipart("image", "big.png", "application/octet-stream", &content);

    let (status, json) = app.upload(content_type, body).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["code"], "FILE_TOO_LARGE");
}

#[tokio::test]
async fn test_upload_above_extractor_default_is_accepted() {
    let app = TestApp::new(MockFaceModel::with_scores([0.1, 0.2, 0.3]));
    let content = vec![7u8; 3 * 1024 * 1024];
    let (content_type, body) = create_upload_multipart("video", "long.mp4", "video/mp4", &content);

    let (status, json) = app.upload(content_type, body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["prediction"], "real");
    assert_eq!(app.media_files(), vec!["long.mp4", "long.mp4.json"]);
    assert_eq!(
        std::fs::metadata(app.media.path().join("long.mp4")).unwrap().len(),
        content.len() as u64
    );
}

#[tokio::test]
async fn test_upload_over_file_limit_reports_file_too_large() {
    let config = Config {
        max_file_size_mb: 1,
        ..Config::default()
    };
    let app = TestApp::with_config(MockFaceModel::with_score(0.2), config);
    let content = vec![0u8; 3 * 1024 * 1024];
    let (content_type, body) = create_upload_multipart("video", "big.mp4", "video/mp4", &content);

    let (status, json) = app.upload(content_type, body).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["code"], "FILE_TOO_LARGE");
    assert!(app.media_files().is_empty());
    assert!(app.staged_files().is_empty());
}

#[tokio::test]
async fn test_upload_undecodable_image() {
    let app = TestApp::new(MockFaceModel::with_score(0.2));
    let (content_type, body) =
        create_upload_multipart("image", "face.png", "image/png", b"definitely not a png");

    let (status, json) = app.upload(content_type, body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_MEDIA");
    assert!(app.records.is_empty());
    assert!(app.staged_files().is_empty());
}

// ============================================================================
// Classification Flow Tests
// ============================================================================

#[tokio::test]
async fn test_authentic_image_is_persisted() {
    let app = TestApp::new(MockFaceModel::with_score(0.2));
    let (content_type, body) =
        create_upload_multipart("image", "my face.png", "image/png", &png_bytes());

    let (status, json) = app.upload(content_type, body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["prediction"], "real");
    assert!((json["confidence"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    assert!(json["metadata_file"]
        .as_str()
        .unwrap()
        .ends_with("my_face.png.json"));
    assert!(json.get("message").is_none());
    assert!(json.get("frames").is_none());

    assert_eq!(app.media_files(), vec!["my_face.png", "my_face.png.json"]);
    assert_eq!(app.records.len(), 1);
    assert!(app.staged_files().is_empty());
}

#[tokio::test]
async fn test_json_named_image_keeps_media_bytes() {
    let app = TestApp::new(MockFaceModel::with_score(0.2));
    let png = png_bytes();
    let (content_type, body) = create_upload_multipart("image", "portrait.json", "image/png", &png);

    let (status, json) = app.upload(content_type, body).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["metadata_file"]
        .as_str()
        .unwrap()
        .ends_with("portrait.json.json"));
    assert_eq!(app.media_files(), vec!["portrait.json", "portrait.json.json"]);
    let saved = std::fs::read(app.media.path().join("portrait.json")).unwrap();
    assert_eq!(saved, png);
    assert!(saved.starts_with(b"\x89PNG"));
}

#[tokio::test]
async fn test_fake_image_is_discarded() {
    let app = TestApp::new(MockFaceModel::with_score(0.87));
    let (content_type, body) = create_upload_multipart("image", "face.png", "image/png", &png_bytes());

    let (status, json) = app.upload(content_type, body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["prediction"], "fake");
    assert_eq!(json["message"], "Deepfake detected, file not saved.");
    assert!(json.get("metadata_file").is_none());
    assert!(app.media_files().is_empty());
    assert_eq!(app.records.len(), 1);
    assert!(app.staged_files().is_empty());
}

#[tokio::test]
async fn test_image_without_face() {
    let app = TestApp::new(MockFaceModel::no_face());
    let (content_type, body) = create_upload_multipart("image", "cat.png", "image/png", &png_bytes());

    let (status, json) = app.upload(content_type, body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["prediction"], "no_face_detected");
    assert_eq!(json["confidence"], 0.0);
    assert_eq!(json["message"], "No face detected, file not saved.");
}

#[tokio::test]
async fn test_model_failure_returns_bad_gateway() {
    let app = TestApp::new(MockFaceModel::failing("model offline"));
    let (content_type, body) = create_upload_multipart("image", "face.png", "image/png", &png_bytes());

    let (status, json) = app.upload(content_type, body).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"], "Model inference failed");
    assert!(app.records.is_empty());
    assert!(app.media_files().is_empty());
    assert!(app.staged_files().is_empty());
}

#[tokio::test]
async fn test_video_reports_frames() {
    let app = TestApp::new(MockFaceModel::with_scores([0.1, 0.9, 0.2]));
    let (content_type, body) =
        create_upload_multipart("video", "clip.mp4", "video/mp4", b"synthetic video");

    let (status, json) = app.upload(content_type, body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["prediction"], "real");
    let frames = json["frames"].as_array().unwrap();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[1]["prediction"], "fake");
    assert!((json["confidence"].as_f64().unwrap() - 0.4).abs() < 1e-6);
    assert_eq!(app.media_files(), vec!["clip.mp4", "clip.mp4.json"]);
}

// ============================================================================
// Record Listing Tests
// ============================================================================

#[tokio::test]
async fn test_predictions_list_records_in_order() {
    let app = TestApp::new(MockFaceModel::with_scores([0.2, 0.8]));

    for name in ["first.png", "second.png"] {
        let (content_type, body) = create_upload_multipart("image", name, "image/png", &png_bytes());
        let (status, _) = app.upload(content_type, body).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, json) = app.get("/api/predictions").await;

    assert_eq!(status, StatusCode::OK);
    let rows = json.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["id"], 1);
    assert_eq!(rows[0]["status"], "real");
    assert_eq!(rows[0]["media_format"], "image");
    assert_eq!(rows[0]["platform"], "instagram");
    assert_eq!(rows[1]["status"], "fake");
    assert_eq!(rows[1]["confidence"], 0.8);
}

#[tokio::test]
async fn test_predictions_empty() {
    let app = TestApp::new(MockFaceModel::with_score(0.2));
    let (status, json) = app.get("/api/predictions").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, Value::Array(vec![]));
}

// ============================================================================
// OpenAPI Documentation Tests
// ============================================================================

#[tokio::test]
async fn test_openapi_json_endpoint() {
    let app = TestApp::new(MockFaceModel::with_score(0.2));
    let (status, json) = app.get("/api-docs/openapi.json").await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/upload"].is_object());
    assert!(json["paths"]["/api/predictions"].is_object());
    assert!(json["paths"]["/health"].is_object());
}
