//! DeepTrace Server - REST API for deepfake detection
//!
//! Exposes deeptrace-core classification via HTTP endpoints:
//! - POST /upload - Classify an uploaded image, audio clip or video
//! - GET /api/predictions - List every classification record
//! - GET /health, GET /ready - Monitoring endpoints

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use deeptrace_core::{
    Detector, FaceModel, MockFaceModel, MockSpectrogramModel, OffsetSource, RandomOffset,
    RecordStore, RemoteModel, RemoteModelConfig, SeededOffset, SpectrogramModel,
    SqliteRecordStore,
};
use deeptrace_server::{create_router_with_config, AppState, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Models = (Arc<dyn FaceModel>, Arc<dyn SpectrogramModel>);

/// Remote models when an inference service is configured, mocks only when
/// explicitly allowed.
fn build_models(config: &Config) -> anyhow::Result<Models> {
    if let Some(url) = &config.inference_url {
        let mut remote = RemoteModelConfig::new(url.clone());
        remote.timeout = Duration::from_secs(config.inference_timeout_secs);
        let model = Arc::new(
            RemoteModel::new(remote).context("Invalid inference service configuration")?,
        );
        let face: Arc<dyn FaceModel> = model.clone();
        let spectrogram: Arc<dyn SpectrogramModel> = model;
        return Ok((face, spectrogram));
    }

    if !config.allow_mock_models {
        bail!("INFERENCE_URL is not set. Set ALLOW_MOCK_MODELS=true to run with mock models");
    }

    tracing::warn!("No inference service configured, using MOCK models (every face scores 0.2)");
    let face: Arc<dyn FaceModel> = Arc::new(MockFaceModel::with_score(0.2));
    let spectrogram: Arc<dyn SpectrogramModel> = Arc::new(MockSpectrogramModel::with_score(0.2));
    Ok((face, spectrogram))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "deeptrace_server=info,deeptrace_core=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let (face, spectrogram) = build_models(&config)?;
    let offsets: Arc<dyn OffsetSource> = match config.frame_seed {
        Some(seed) => {
            tracing::info!(seed, "Using seeded frame offsets");
            Arc::new(SeededOffset::new(seed))
        }
        None => Arc::new(RandomOffset),
    };
    let detector = Detector::builder(face, spectrogram)
        .offsets(offsets)
        .sampler_config(config.sampler_config())
        .build();

    let store = SqliteRecordStore::connect(&config.database_url)
        .await
        .context("Failed to open record store")?;
    store.migrate().await.context("Failed to run record store migrations")?;
    let records: Arc<dyn RecordStore> = Arc::new(store);

    let state = AppState::new(&config, detector, records);
    let app = create_router_with_config(state, &config);

    let addr = config.socket_addr();
    tracing::info!(
        upload_dir = %config.upload_dir.display(),
        media_dir = %config.media_dir.display(),
        "DeepTrace server listening on {addr}"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    Ok(())
}
