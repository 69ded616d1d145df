//! Core domain types for the studiolink chunked upload subsystem.
//!
//! This crate defines the data model shared by the other crates:
//! - Session, tenant and user identifiers
//! - Upload sessions and their chunk buffers
//! - Media classification and ingestion descriptors
//! - Upload configuration

pub mod config;
pub mod error;
pub mod identity;
pub mod media;
pub mod upload;

pub use error::{Error, Result};
pub use identity::{TenantId, UserId};
pub use media::{MediaDescriptor, MediaKind};
pub use upload::{
    AssemblyError, ChunkBuffer, ChunkInsert, NewUploadSession, SessionId, UploadSession,
    UploadStatus,
};

/// Default ceiling for image uploads: 10 MiB
pub const DEFAULT_MAX_IMAGE_SIZE: u64 = 10 * 1024 * 1024;

/// Default ceiling for video uploads: 500 MiB
pub const DEFAULT_MAX_VIDEO_SIZE: u64 = 500 * 1024 * 1024;

/// Default ceiling for a single chunk request body: 10 MiB
pub const DEFAULT_MAX_CHUNK_REQUEST_SIZE: u64 = 10 * 1024 * 1024;
