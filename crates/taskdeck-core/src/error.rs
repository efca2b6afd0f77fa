//! Error types for taskdeck

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A required caller-supplied field was missing or blank.
    /// Raised before any state change.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Snapshot could not be written or read back.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Invalid priority: {0}")]
    InvalidPriority(String),
}

impl Error {
    /// True for failures coming from the persistence layer.
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::Io(_) | Error::Json(_))
    }
}
