//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use deeptrace_core::frames::{DEFAULT_FRAME_SIZE, DEFAULT_FRAME_STRIDE, DEFAULT_SAMPLE_FRAMES};
use deeptrace_core::SamplerConfig;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 5000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: IpAddr,
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in MB (default: 100)
    pub body_limit_mb: usize,
    /// Maximum file size per upload in MB (default: 50)
    pub max_file_size_mb: usize,
    /// Request timeout in seconds (default: 120)
    pub timeout_secs: u64,
    /// Enable rate limiting (default: false for tests, true when loaded from env)
    pub rate_limit_enabled: bool,
    /// Rate limit: requests per second (default: 5)
    pub rate_limit_per_sec: u64,
    /// Rate limit: burst size (default: 10)
    pub rate_limit_burst: u32,
    /// Base URL of the inference service
    pub inference_url: Option<String>,
    /// Per-call inference timeout in seconds (default: 60)
    pub inference_timeout_secs: u64,
    /// Allow mock models when no inference service is configured
    pub allow_mock_models: bool,
    /// Record store URL (default: sqlite://predictions.db)
    pub database_url: String,
    /// Directory for temporary uploads
    pub upload_dir: PathBuf,
    /// Directory for persisted authentic media
    pub media_dir: PathBuf,
    /// Owner written into media metadata
    pub owner_tag: String,
    /// Platform written into classification records
    pub platform_tag: String,
    pub sample_frames: usize,
    pub frame_stride: usize,
    pub frame_size: u32,
    /// Seed for reproducible frame offsets
    pub frame_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            allowed_origins: None, // None = allow all (dev mode)
            body_limit_mb: 100,
            max_file_size_mb: 50,
            timeout_secs: 120,
            rate_limit_enabled: false, // Disabled by default (for tests)
            rate_limit_per_sec: 5,
            rate_limit_burst: 10,
            inference_url: None,
            inference_timeout_secs: 60,
            allow_mock_models: true, // Enabled by default for tests; from_env() defaults to false
            database_url: "sqlite://predictions.db".to_string(),
            upload_dir: PathBuf::from("uploads"),
            media_dir: PathBuf::from("media"),
            owner_tag: "DeepTracers".to_string(),
            platform_tag: "instagram".to_string(),
            sample_frames: DEFAULT_SAMPLE_FRAMES,
            frame_stride: DEFAULT_FRAME_STRIDE,
            frame_size: DEFAULT_FRAME_SIZE,
            frame_seed: None,
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let allowed_origins = std::env::var("ALLOWED_ORIGINS").ok().map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        // Rate limiting enabled by default in production, can be disabled with RATE_LIMIT_ENABLED=false
        let rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        let allow_mock_models = std::env::var("ALLOW_MOCK_MODELS")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        Self {
            port: env_parse("PORT").unwrap_or(defaults.port),
            host: env_parse("HOST").unwrap_or(defaults.host),
            allowed_origins,
            body_limit_mb: env_parse("BODY_LIMIT_MB").unwrap_or(defaults.body_limit_mb),
            max_file_size_mb: env_parse("MAX_FILE_SIZE_MB").unwrap_or(defaults.max_file_size_mb),
            timeout_secs: env_parse("REQUEST_TIMEOUT_SECS").unwrap_or(defaults.timeout_secs),
            rate_limit_enabled,
            rate_limit_per_sec: env_parse("RATE_LIMIT_PER_SEC")
                .unwrap_or(defaults.rate_limit_per_sec),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST").unwrap_or(defaults.rate_limit_burst),
            inference_url: env_string("INFERENCE_URL"),
            inference_timeout_secs: env_parse("INFERENCE_TIMEOUT_SECS")
                .unwrap_or(defaults.inference_timeout_secs),
            allow_mock_models,
            database_url: env_string("DATABASE_URL").unwrap_or(defaults.database_url),
            upload_dir: env_string("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            media_dir: env_string("MEDIA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.media_dir),
            owner_tag: env_string("OWNER_TAG").unwrap_or(defaults.owner_tag),
            platform_tag: env_string("PLATFORM_TAG").unwrap_or(defaults.platform_tag),
            sample_frames: env_parse("SAMPLE_FRAMES").unwrap_or(defaults.sample_frames),
            frame_stride: env_parse("FRAME_STRIDE").unwrap_or(defaults.frame_stride),
            frame_size: env_parse("FRAME_SIZE").unwrap_or(defaults.frame_size),
            frame_seed: env_parse("FRAME_SEED"),
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Per-file upload limit in bytes
    pub fn max_file_size(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }

    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            n_frames: self.sample_frames,
            stride: self.frame_stride,
            output_size: self.frame_size,
        }
    }
}
