//! HTTP client for an external inference service.
//!
//! The service hosts the face detector, the face classifier and the
//! spectrogram classifier behind three JSON endpoints:
//!
//! | Endpoint             | Request                   | Response                 |
//! |----------------------|---------------------------|--------------------------|
//! | `POST /v1/face/detect` | `{"image": "<b64 png>"}` | `{"face": "<b64 png>" \| null}` |
//! | `POST /v1/face/score`  | `{"image": "<b64 png>"}` | `{"score": 0.42}`        |
//! | `POST /v1/audio/score` | `{"features": [[..]]}`   | `{"score": 0.42}`        |
//!
//! Requests are attempted once. A failure surfaces as an inference error.

use std::io::Cursor;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use image::{ImageFormat, RgbImage};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::{FaceModel, SpectrogramModel};
use crate::audio::MfccGrid;
use crate::error::{DeeptraceError, Result};

/// Default timeout for inference requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for the inference client.
#[derive(Debug, Clone)]
pub struct RemoteModelConfig {
    /// Base URL of the inference service, without a trailing path.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl RemoteModelConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    image: &'a str,
}

#[derive(Serialize)]
struct FeaturesRequest<'a> {
    features: &'a [Vec<f32>],
}

#[derive(Deserialize)]
struct DetectResponse {
    face: Option<String>,
}

#[derive(Deserialize)]
struct ScoreResponse {
    score: f64,
}

/// Face and spectrogram models served over HTTP.
///
/// ## Example
///
/// ```no_run
/// use deeptrace_core::classifier::{RemoteModel, RemoteModelConfig};
///
/// # fn example() -> deeptrace_core::Result<()> {
/// let model = RemoteModel::new(RemoteModelConfig::new("http://127.0.0.1:8500"))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RemoteModel {
    client: Client,
    base_url: String,
}

impl RemoteModel {
    #[instrument(level = "debug", skip_all, fields(
        base_url = %config.base_url,
        timeout_ms = config.timeout.as_millis() as u64
    ))]
    pub fn new(config: RemoteModelConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(DeeptraceError::InvalidInput(format!(
                "Inference URL must be http(s): {base_url}"
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                warn!(error = %e, "Failed to create HTTP client");
                DeeptraceError::Inference(format!("Failed to create HTTP client: {e}"))
            })?;

        info!(base_url = %base_url, "Inference client created");
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let url = format!("{}{path}", self.base_url);
        let start = Instant::now();

        let response = self.client.post(&url).json(body).send().await.map_err(|e| {
            warn!(error = %e, url = %url, "Inference request failed");
            DeeptraceError::Inference(format!("Inference request failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, url = %url, "Inference service returned an error");
            return Err(DeeptraceError::Inference(format!(
                "Inference service returned status: {status}"
            )));
        }

        let parsed = response.json::<R>().await.map_err(|e| {
            warn!(error = %e, "Failed to parse inference response");
            DeeptraceError::Inference(format!("Failed to parse inference response: {e}"))
        })?;

        debug!(
            url = %url,
            latency_ms = start.elapsed().as_millis() as u64,
            "Inference request completed"
        );
        Ok(parsed)
    }
}

fn encode_png(image: &RgbImage) -> Result<String> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| DeeptraceError::Decode(format!("Failed to encode PNG: {e}")))?;
    Ok(STANDARD.encode(bytes))
}

fn decode_png(encoded: &str) -> Result<RgbImage> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| DeeptraceError::Inference(format!("Invalid base64 face crop: {e}")))?;
    let image = image::load_from_memory(&bytes)
        .map_err(|e| DeeptraceError::Inference(format!("Invalid face crop: {e}")))?;
    Ok(image.to_rgb8())
}

#[async_trait]
impl FaceModel for RemoteModel {
    #[instrument(level = "debug", skip_all, fields(width = image.width(), height = image.height()))]
    async fn detect_face(&self, image: &RgbImage) -> Result<Option<RgbImage>> {
        let encoded = encode_png(image)?;
        let response: DetectResponse = self
            .post("/v1/face/detect", &ImageRequest { image: &encoded })
            .await?;
        response.face.as_deref().map(decode_png).transpose()
    }

    #[instrument(level = "debug", skip_all)]
    async fn score(&self, face: &RgbImage) -> Result<f64> {
        let encoded = encode_png(face)?;
        let response: ScoreResponse = self
            .post("/v1/face/score", &ImageRequest { image: &encoded })
            .await?;
        Ok(response.score)
    }

    fn backend(&self) -> &'static str {
        "remote"
    }
}

#[async_trait]
impl SpectrogramModel for RemoteModel {
    #[instrument(level = "debug", skip_all)]
    async fn score(&self, features: &MfccGrid) -> Result<f64> {
        let response: ScoreResponse = self
            .post(
                "/v1/audio/score",
                &FeaturesRequest {
                    features: features.rows(),
                },
            )
            .await?;
        Ok(response.score)
    }

    fn backend(&self) -> &'static str {
        "remote"
    }
}
