//! In-memory session registry backed by a sharded concurrent map.

use crate::error::{RegistryError, RegistryResult};
use crate::store::{SessionPredicate, SessionRegistry};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use studiolink_core::{SessionId, UploadSession};

/// Process-memory session registry.
#[derive(Default)]
pub struct InMemoryRegistry {
    sessions: DashMap<SessionId, Arc<UploadSession>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRegistry for InMemoryRegistry {
    async fn create(&self, session: Arc<UploadSession>) -> RegistryResult<()> {
        let id = session.id();
        match self.sessions.entry(id) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyExists(format!(
                "upload session {id}"
            ))),
            Entry::Vacant(entry) => {
                entry.insert(session);
                tracing::debug!(session_id = %id, "Upload session registered");
                Ok(())
            }
        }
    }

    async fn get(&self, id: SessionId) -> RegistryResult<Option<Arc<UploadSession>>> {
        Ok(self.sessions.get(&id).map(|entry| entry.value().clone()))
    }

    async fn update(&self, session: Arc<UploadSession>) -> RegistryResult<()> {
        let id = session.id();
        match self.sessions.get_mut(&id) {
            Some(mut entry) => {
                *entry = session;
                Ok(())
            }
            None => Err(RegistryError::NotFound(format!("upload session {id}"))),
        }
    }

    async fn delete(&self, id: SessionId) -> RegistryResult<Option<Arc<UploadSession>>> {
        Ok(self.sessions.remove(&id).map(|(_, session)| session))
    }

    async fn delete_if(
        &self,
        id: SessionId,
        predicate: SessionPredicate<'_>,
    ) -> RegistryResult<Option<Arc<UploadSession>>> {
        Ok(self
            .sessions
            .remove_if(&id, |_, session| predicate(session))
            .map(|(_, session)| session))
    }

    async fn list_all(&self) -> RegistryResult<Vec<Arc<UploadSession>>> {
        Ok(self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn len(&self) -> RegistryResult<usize> {
        Ok(self.sessions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studiolink_core::{NewUploadSession, TenantId, UserId};

    fn new_session() -> Arc<UploadSession> {
        Arc::new(UploadSession::new(NewUploadSession {
            tenant_id: TenantId::new("studio-1").unwrap(),
            uploader_id: UserId::new("alice").unwrap(),
            file_name: "kitchen.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            description: Some("north-facing kitchen".to_string()),
            total_size: 10,
            total_chunks: 2,
        }))
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let registry = InMemoryRegistry::new();
        let session = new_session();
        let id = session.id();

        registry.create(session.clone()).await.unwrap();
        let fetched = registry.get(id).await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&fetched, &session));
        assert_eq!(registry.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_id() {
        let registry = InMemoryRegistry::new();
        let session = new_session();

        registry.create(session.clone()).await.unwrap();
        match registry.create(session).await {
            Err(RegistryError::AlreadyExists(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let registry = InMemoryRegistry::new();
        assert!(registry.get(SessionId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_replaces_existing() {
        let registry = InMemoryRegistry::new();
        let session = new_session();
        registry.create(session.clone()).await.unwrap();

        registry.update(session.clone()).await.unwrap();
        let fetched = registry.get(session.id()).await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&fetched, &session));
    }

    #[tokio::test]
    async fn test_update_does_not_resurrect_deleted() {
        let registry = InMemoryRegistry::new();
        let session = new_session();
        registry.create(session.clone()).await.unwrap();
        registry.delete(session.id()).await.unwrap();

        match registry.update(session.clone()).await {
            Err(RegistryError::NotFound(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(registry.get(session.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let registry = InMemoryRegistry::new();
        let session = new_session();
        let id = session.id();
        registry.create(session).await.unwrap();

        assert!(registry.delete(id).await.unwrap().is_some());
        assert!(registry.delete(id).await.unwrap().is_none());
        assert_eq!(registry.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_if_respects_predicate() {
        let registry = InMemoryRegistry::new();
        let session = new_session();
        let id = session.id();
        registry.create(session).await.unwrap();

        assert!(registry.delete_if(id, &|_| false).await.unwrap().is_none());
        assert!(registry.get(id).await.unwrap().is_some());

        let removed = registry
            .delete_if(id, &|s| s.file_name() == "kitchen.jpg")
            .await
            .unwrap();
        assert!(removed.is_some());
        assert!(registry.get(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_all_is_snapshot() {
        let registry = InMemoryRegistry::new();
        for _ in 0..3 {
            registry.create(new_session()).await.unwrap();
        }

        let snapshot = registry.list_all().await.unwrap();
        assert_eq!(snapshot.len(), 3);

        registry.delete(snapshot[0].id()).await.unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(registry.len().await.unwrap(), 2);
    }
}
