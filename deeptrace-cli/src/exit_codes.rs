//! Exit codes following sysexits.h conventions.
//!
//! These codes provide semantic meaning for different failure modes,
//! enabling scripts and CI systems to handle errors appropriately.

use std::io::ErrorKind;

use deeptrace_core::DeeptraceError;

/// Successful execution, or media classified as authentic.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Media classified as manipulated.
/// Maps to EX_DATAERR from sysexits.h.
pub const MANIPULATED: i32 = 65;

/// Cannot open or decode the input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Inference service missing or failing.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const INFERENCE_UNAVAILABLE: i32 = 69;

/// I/O or record store error.
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Outcomes the commands report through the error path.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Manipulated media detected")]
    Manipulated,

    #[error("{0}")]
    Usage(String),

    #[error("{0}")]
    Unavailable(String),
}

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");
        let code = err
            .chain()
            .find_map(|cause| {
                if let Some(e) = cause.downcast_ref::<CliError>() {
                    Some(match e {
                        CliError::Manipulated => MANIPULATED,
                        CliError::Usage(_) => USAGE_ERROR,
                        CliError::Unavailable(_) => INFERENCE_UNAVAILABLE,
                    })
                } else if let Some(e) = cause.downcast_ref::<DeeptraceError>() {
                    Some(classify_library_error(e))
                } else {
                    cause.downcast_ref::<std::io::Error>().map(classify_io_error)
                }
            })
            .unwrap_or(GENERAL_ERROR);

        Self {
            code,
            message: Some(message),
        }
    }
}

fn classify_library_error(err: &DeeptraceError) -> i32 {
    match err {
        DeeptraceError::InvalidInput(_)
        | DeeptraceError::Decode(_)
        | DeeptraceError::ExternalTool { .. }
        | DeeptraceError::FeatureExtraction(_) => INPUT_ERROR,
        DeeptraceError::Inference(_) | DeeptraceError::HttpError(_) => INFERENCE_UNAVAILABLE,
        DeeptraceError::Io(e) => classify_io_error(e),
        DeeptraceError::Persistence(_) | DeeptraceError::RecordStore(_) => IO_ERROR,
    }
}

fn classify_io_error(err: &std::io::Error) -> i32 {
    match err.kind() {
        ErrorKind::NotFound | ErrorKind::PermissionDenied => INPUT_ERROR,
        _ => IO_ERROR,
    }
}
