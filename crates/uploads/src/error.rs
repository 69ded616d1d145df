//! Upload error taxonomy.

use crate::collaborators::BoxError;
use studiolink_registry::RegistryError;

/// Broad classification used by the request layer to pick a protocol response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    InvalidState,
    InputInvalid,
    Cancelled,
    Unavailable,
    Internal,
}

/// Upload operation errors.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid input: {0}")]
    InputInvalid(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("tenancy check failed: {0}")]
    TenancyCheck(#[source] BoxError),

    #[error("media ingestion failed: {0}")]
    Ingestion(#[source] BoxError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl UploadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::InputInvalid(_) => ErrorKind::InputInvalid,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::TenancyCheck(_) | Self::Ingestion(_) => ErrorKind::Unavailable,
            Self::Registry(e) => match e {
                RegistryError::NotFound(_) => ErrorKind::NotFound,
                _ => ErrorKind::Internal,
            },
        }
    }

    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::InvalidState(_) => "invalid_state",
            Self::InputInvalid(_) => "input_invalid",
            Self::Cancelled => "cancelled",
            Self::TenancyCheck(_) => "tenancy_check_failed",
            Self::Ingestion(_) => "ingestion_failed",
            Self::Registry(_) => "registry_error",
        }
    }
}

impl From<studiolink_core::Error> for UploadError {
    fn from(e: studiolink_core::Error) -> Self {
        match e {
            studiolink_core::Error::Config(msg) => Self::InvalidState(msg),
            other => Self::InputInvalid(other.to_string()),
        }
    }
}

/// Result type for upload operations.
pub type UploadResult<T> = std::result::Result<T, UploadError>;
