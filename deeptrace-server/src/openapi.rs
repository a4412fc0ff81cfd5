//! OpenAPI documentation configuration
//!
//! Generates OpenAPI 3.0 specification for the DeepTrace detection API.

use utoipa::OpenApi;

use crate::handlers::{
    FramePrediction, HealthResponse, PredictionRecord, ReadyResponse, UploadResponse,
};

/// DeepTrace Detection API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "DeepTrace - Detection API",
        version = "0.1.0",
        description = r#"
## Deepfake Detection API

DeepTrace classifies uploaded media as **real** or **fake**:

- **Images** - one face crop scored by the face model
- **Video** - a contiguous run of sampled frames, each scored, then a majority vote
- **Audio** - a fixed 40 x 500 MFCC grid scored by the spectrogram model

### How It Works

1. Upload one file via `POST /upload` under a field named `image`, `audio` or `video`
2. Every classified upload is appended to the record log
3. Authentic media is kept in the media directory with a SHA3-256 metadata sidecar
4. Manipulated or inconclusive media is discarded
5. The full record log is available at `GET /api/predictions`
"#,
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:5000", description = "Local development server")
    ),
    tags(
        (name = "Detection", description = "Classify uploaded media"),
        (name = "Records", description = "Classification record log"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::handlers::upload::upload_handler,
        crate::handlers::predictions::predictions_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ReadyResponse,
            UploadResponse,
            FramePrediction,
            PredictionRecord,
        )
    )
)]
pub struct ApiDoc;
