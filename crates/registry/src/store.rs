//! Session registry trait.

use crate::error::RegistryResult;
use async_trait::async_trait;
use std::sync::Arc;
use studiolink_core::{SessionId, UploadSession};

/// Predicate evaluated against a session while the registry holds its entry.
pub type SessionPredicate<'a> = &'a (dyn Fn(&UploadSession) -> bool + Send + Sync);

/// Concurrent key-to-session store.
///
/// The registry owns the canonical session; callers hold only the
/// [`SessionId`] between requests and look the session up each time.
/// Implementations must tolerate arbitrary interleavings of every method.
#[async_trait]
pub trait SessionRegistry: Send + Sync {
    /// Insert a new session. Fails with `AlreadyExists` on a duplicate ID.
    async fn create(&self, session: Arc<UploadSession>) -> RegistryResult<()>;

    /// Look up a session by ID.
    async fn get(&self, id: SessionId) -> RegistryResult<Option<Arc<UploadSession>>>;

    /// Replace the stored session with the same ID (last writer wins).
    ///
    /// Fails with `NotFound` if the session was deleted in the meantime, so a
    /// late writer can never resurrect a cancelled or swept session.
    async fn update(&self, session: Arc<UploadSession>) -> RegistryResult<()>;

    /// Remove a session. Idempotent: deleting a missing ID returns `None`.
    async fn delete(&self, id: SessionId) -> RegistryResult<Option<Arc<UploadSession>>>;

    /// Remove a session only if `predicate` still holds for it at removal time.
    async fn delete_if(
        &self,
        id: SessionId,
        predicate: SessionPredicate<'_>,
    ) -> RegistryResult<Option<Arc<UploadSession>>>;

    /// Point-in-time snapshot of every session.
    async fn list_all(&self) -> RegistryResult<Vec<Arc<UploadSession>>>;

    /// Number of sessions currently held.
    async fn len(&self) -> RegistryResult<usize>;
}
