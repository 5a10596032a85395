//! Error types for the schema gate

use thiserror::Error;

/// Result type for gate operations
pub type Result<T> = std::result::Result<T, GateError>;

/// Schema gate errors
///
/// Per-file problems (missing content, unparseable schemas) never surface as a
/// `GateError`; they become change records. These variants cover the failures
/// that stop a run before any report exists.
#[derive(Error, Debug)]
pub enum GateError {
    #[error("Revision not found: {0}")]
    RevisionNotFound(String),

    #[error("Invalid revision source: {0}")]
    InvalidSource(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),
}
