use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeeptraceError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Media decoding failed: {0}")]
    Decode(String),

    #[error("Feature extraction failed: {0}")]
    FeatureExtraction(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("External tool `{tool}` failed: {message}")]
    ExternalTool { tool: &'static str, message: String },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Record store error: {0}")]
    RecordStore(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "network")]
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, DeeptraceError>;
