//! Error types for scribe-store

use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during persistence operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
