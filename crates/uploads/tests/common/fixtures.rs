use super::mocks::{RecordingIngestion, StaticTenancy};
use bytes::Bytes;
use std::sync::Arc;
use studiolink_core::config::UploadConfig;
use studiolink_core::{NewUploadSession, TenantId, UserId};
use studiolink_registry::InMemoryRegistry;
use studiolink_uploads::UploadService;

#[allow(dead_code)]
pub fn tenant() -> TenantId {
    TenantId::new("studio-42").unwrap()
}

#[allow(dead_code)]
pub fn uploader() -> UserId {
    UserId::new("photographer").unwrap()
}

#[allow(dead_code)]
pub fn intruder() -> UserId {
    UserId::new("someone-else").unwrap()
}

/// Initiate request for an image upload.
#[allow(dead_code)]
pub fn image_request(total_size: u64, total_chunks: u32) -> NewUploadSession {
    NewUploadSession {
        tenant_id: tenant(),
        uploader_id: uploader(),
        file_name: "living-room.jpg".to_string(),
        content_type: "image/jpeg".to_string(),
        description: Some("staged living room".to_string()),
        total_size,
        total_chunks,
    }
}

/// Initiate request for a video upload.
#[allow(dead_code)]
pub fn video_request(total_size: u64, total_chunks: u32) -> NewUploadSession {
    NewUploadSession {
        file_name: "walkthrough.mp4".to_string(),
        content_type: "video/mp4".to_string(),
        description: None,
        ..image_request(total_size, total_chunks)
    }
}

/// Deterministic chunk payload: `len` copies of the chunk index.
#[allow(dead_code)]
pub fn chunk(index: u32, len: usize) -> Bytes {
    Bytes::from(vec![index as u8; len])
}

#[allow(dead_code)]
pub struct TestHarness {
    pub service: UploadService,
    pub registry: Arc<InMemoryRegistry>,
    pub tenancy: Arc<StaticTenancy>,
    pub ingestion: Arc<RecordingIngestion>,
}

/// Service wired to in-memory collaborators, with the uploader a member of
/// the test tenant.
#[allow(dead_code)]
pub fn harness() -> TestHarness {
    harness_with(UploadConfig::for_testing(), RecordingIngestion::new())
}

#[allow(dead_code)]
pub fn harness_with(config: UploadConfig, ingestion: Arc<RecordingIngestion>) -> TestHarness {
    let registry = Arc::new(InMemoryRegistry::new());
    let tenancy = StaticTenancy::new(&[(&uploader(), &tenant())]);
    let service = UploadService::new(
        config,
        registry.clone(),
        tenancy.clone(),
        ingestion.clone(),
    );
    TestHarness {
        service,
        registry,
        tenancy,
        ingestion,
    }
}
