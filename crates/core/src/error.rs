//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid session ID: {0}")]
    InvalidSessionId(String),

    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("invalid upload request: {0}")]
    InvalidUpload(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
