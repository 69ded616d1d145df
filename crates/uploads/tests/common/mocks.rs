use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use studiolink_core::{MediaDescriptor, SessionId, TenantId, UploadSession, UserId};
use studiolink_registry::{
    InMemoryRegistry, RegistryError, RegistryResult, SessionPredicate, SessionRegistry,
};
use studiolink_uploads::{BoxError, IngestRequest, MediaIngestion, TenancyCheck};
use time::OffsetDateTime;
use uuid::Uuid;

/// Tenancy check backed by a fixed membership list.
#[allow(dead_code)]
pub struct StaticTenancy {
    members: HashSet<(String, String)>,
    pub fail: AtomicBool,
}

#[allow(dead_code)]
impl StaticTenancy {
    pub fn new(members: &[(&UserId, &TenantId)]) -> Arc<Self> {
        Arc::new(Self {
            members: members
                .iter()
                .map(|(u, t)| (u.as_str().to_string(), t.as_str().to_string()))
                .collect(),
            fail: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl TenancyCheck for StaticTenancy {
    async fn is_member(&self, user: &UserId, tenant: &TenantId) -> Result<bool, BoxError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err("tenancy service unavailable".into());
        }
        Ok(self
            .members
            .contains(&(user.as_str().to_string(), tenant.as_str().to_string())))
    }
}

/// Ingestion that keeps every request it receives.
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingIngestion {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    pub delay: Option<Duration>,
    requests: Mutex<Vec<IngestRequest>>,
}

#[allow(dead_code)]
impl RecordingIngestion {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<IngestRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl MediaIngestion for RecordingIngestion {
    async fn ingest(&self, request: IngestRequest) -> Result<MediaDescriptor, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err("media store rejected the asset".into());
        }

        let descriptor = MediaDescriptor {
            media_id: Uuid::new_v4(),
            tenant_id: request.tenant_id.clone(),
            uploader_id: request.uploader_id.clone(),
            file_name: request.file_name.clone(),
            content_type: request.content_type.clone(),
            size_bytes: request.content.len() as u64,
            location: Some(format!("media/{}", request.file_name)),
            created_at: OffsetDateTime::now_utc(),
        };
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);
        Ok(descriptor)
    }
}

/// Registry whose conditional deletes always fail, for sweep error paths.
#[allow(dead_code)]
#[derive(Default)]
pub struct FailingDeleteRegistry {
    inner: InMemoryRegistry,
}

#[async_trait]
impl SessionRegistry for FailingDeleteRegistry {
    async fn create(&self, session: Arc<UploadSession>) -> RegistryResult<()> {
        self.inner.create(session).await
    }

    async fn get(&self, id: SessionId) -> RegistryResult<Option<Arc<UploadSession>>> {
        self.inner.get(id).await
    }

    async fn update(&self, session: Arc<UploadSession>) -> RegistryResult<()> {
        self.inner.update(session).await
    }

    async fn delete(&self, id: SessionId) -> RegistryResult<Option<Arc<UploadSession>>> {
        self.inner.delete(id).await
    }

    async fn delete_if(
        &self,
        _id: SessionId,
        _predicate: SessionPredicate<'_>,
    ) -> RegistryResult<Option<Arc<UploadSession>>> {
        Err(RegistryError::Internal("injected delete failure".to_string()))
    }

    async fn list_all(&self) -> RegistryResult<Vec<Arc<UploadSession>>> {
        self.inner.list_all().await
    }

    async fn len(&self) -> RegistryResult<usize> {
        self.inner.len().await
    }
}
