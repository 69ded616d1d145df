//! Contracts for the collaborators the upload core calls out to.
//!
//! Both are implemented outside this crate: tenancy lives with identity
//! management and ingestion with the media asset store.

use async_trait::async_trait;
use bytes::Bytes;
use studiolink_core::{MediaDescriptor, TenantId, UserId};

/// Boxed error returned by collaborator implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Answers whether a user belongs to a tenant.
#[async_trait]
pub trait TenancyCheck: Send + Sync {
    async fn is_member(&self, user: &UserId, tenant: &TenantId) -> Result<bool, BoxError>;
}

/// A fully reassembled file handed to media ingestion.
#[derive(Clone, Debug)]
pub struct IngestRequest {
    pub tenant_id: TenantId,
    pub uploader_id: UserId,
    /// Reassembled file content, exactly `declared_size` bytes.
    pub content: Bytes,
    pub file_name: String,
    pub content_type: String,
    pub declared_size: u64,
    pub description: Option<String>,
}

/// Persists reassembled media and describes the stored asset.
#[async_trait]
pub trait MediaIngestion: Send + Sync {
    async fn ingest(&self, request: IngestRequest) -> Result<MediaDescriptor, BoxError>;
}
