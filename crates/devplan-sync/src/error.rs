//! Error types for remote stores and the snapshot cache

use devplan_core::ValidationError;
use thiserror::Error;

/// Remote store error
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned an error status
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    /// Request rejected locally before reaching the store
    #[error("Rejected: {0}")]
    Rejected(#[from] ValidationError),

    /// Client could not be configured
    #[error("Invalid client configuration: {0}")]
    Config(String),
}

/// Snapshot cache write failure
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
