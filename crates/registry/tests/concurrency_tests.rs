//! Concurrency tests for the in-memory session registry.
//!
//! Exercises interleaved create/get/update/delete traffic and concurrent chunk
//! inserts into shared sessions.

use bytes::Bytes;
use futures::future::join_all;
use std::sync::Arc;
use studiolink_core::{ChunkInsert, NewUploadSession, TenantId, UploadSession, UserId};
use studiolink_registry::{InMemoryRegistry, SessionRegistry};
use time::OffsetDateTime;

fn new_session(total_size: u64, total_chunks: u32) -> Arc<UploadSession> {
    Arc::new(UploadSession::new(NewUploadSession {
        tenant_id: TenantId::new("studio-42").unwrap(),
        uploader_id: UserId::new("photographer").unwrap(),
        file_name: "tour.mp4".to_string(),
        content_type: "video/mp4".to_string(),
        description: None,
        total_size,
        total_chunks,
    }))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_interleaved_registry_operations() {
    let registry = Arc::new(InMemoryRegistry::new());

    let handles: Vec<_> = (0..64)
        .map(|i| {
            let registry = registry.clone();
            tokio::spawn(async move {
                let session = new_session(100, 1);
                let id = session.id();
                registry.create(session.clone()).await.unwrap();
                assert!(registry.get(id).await.unwrap().is_some());
                registry.update(session).await.unwrap();
                let _ = registry.list_all().await.unwrap();
                if i % 2 == 0 {
                    registry.delete(id).await.unwrap();
                    registry.delete(id).await.unwrap();
                }
            })
        })
        .collect();

    for result in join_all(handles).await {
        result.unwrap();
    }

    assert_eq!(registry.len().await.unwrap(), 32);
    assert_eq!(registry.list_all().await.unwrap().len(), 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_chunks_store_once() {
    let session = new_session(1_000, 10);

    let handles: Vec<_> = (0..50)
        .map(|i| {
            let session = session.clone();
            tokio::spawn(async move {
                // Every task races on index 3 with different payloads
                let payload = Bytes::from(vec![i as u8; 10]);
                session.accept_chunk(3, payload).unwrap()
            })
        })
        .collect();

    let outcomes: Vec<ChunkInsert> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let inserted = outcomes
        .iter()
        .filter(|o| **o == ChunkInsert::Inserted)
        .count();
    assert_eq!(inserted, 1, "exactly one racer may store the chunk");
    assert_eq!(session.uploaded_chunks(), 1);
    assert_eq!(session.chunks().buffered_bytes(), 10);
    assert_eq!(session.chunks().received_indices(), vec![3]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_distinct_chunks_respect_declared_size() {
    // 20 chunks of 10 bytes race for a 150 byte budget
    let session = new_session(150, 20);

    let handles: Vec<_> = (0..20u32)
        .map(|i| {
            let session = session.clone();
            tokio::spawn(async move { session.accept_chunk(i, Bytes::from(vec![0u8; 10])).unwrap() })
        })
        .collect();

    let outcomes: Vec<ChunkInsert> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let inserted = outcomes
        .iter()
        .filter(|o| **o == ChunkInsert::Inserted)
        .count();
    assert_eq!(inserted, 15);
    assert_eq!(session.chunks().buffered_bytes(), 150);
    assert_eq!(session.chunks().received_count(), 15);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_conditional_delete_races_with_touch() {
    let registry = Arc::new(InMemoryRegistry::new());
    let session = new_session(100, 4);
    let id = session.id();
    registry.create(session.clone()).await.unwrap();

    let cutoff = OffsetDateTime::now_utc() + time::Duration::seconds(30);
    // A touch after the cutoff keeps the session alive
    session.touch(cutoff + time::Duration::seconds(1));

    let removed = registry
        .delete_if(id, &|s| s.last_activity_at() < cutoff)
        .await
        .unwrap();
    assert!(removed.is_none());
    assert!(registry.get(id).await.unwrap().is_some());
}
