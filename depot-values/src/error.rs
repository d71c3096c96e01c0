//! Abstract error kinds shared across the depot (see spec §7 Error Handling Design).
//!
//! These are the kinds every subsystem propagates; the HTTP transport layer
//! (`depot-api`) maps them onto concrete status codes.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DepotError>;

#[derive(Debug, Error, Clone)]
pub enum DepotError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("a download for '{0}' is already running")]
    AlreadyRunning(String),

    #[error("authentication required to access '{0}'")]
    AuthRequired(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("transient error, retries exhausted: {0}")]
    Transient(String),

    #[error("insufficient disk space: need {required}, have {available}")]
    InsufficientDiskSpace { required: String, available: String },

    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("no downloader claims model source '{0}'")]
    ModelSourceNotFound(String),

    #[error("failed to load model '{model}': {reason}")]
    ModelLoadFailure { model: String, reason: String },

    #[error("no adapter available for format={format} type={model_type:?}")]
    AdapterUnavailable { format: String, model_type: String },

    #[error("generation failed: {0}")]
    GenerationFailure(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(String),

    #[error("checksum mismatch for '{file}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },
}

impl From<std::io::Error> for DepotError {
    fn from(e: std::io::Error) -> Self {
        DepotError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for DepotError {
    fn from(e: serde_json::Error) -> Self {
        DepotError::InvalidRequest(format!("json: {e}"))
    }
}
