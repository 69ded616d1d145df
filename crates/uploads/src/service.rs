//! Upload orchestrator.
//!
//! Every operation takes an already-authenticated caller identity and a
//! cancellation token owned by the request layer. Sessions are looked up in
//! the registry on each call; nothing here keeps a live session reference
//! between calls.

use crate::collaborators::{IngestRequest, MediaIngestion, TenancyCheck};
use crate::error::{UploadError, UploadResult};
use crate::metrics::{
    ACTIVE_UPLOAD_SESSIONS, BYTES_BUFFERED, CHUNKS_ACCEPTED, CHUNKS_DUPLICATE, INTEGRITY_FAILURES,
    UPLOAD_COMPLETE_DURATION, UPLOAD_SESSIONS_CANCELLED, UPLOAD_SESSIONS_COMPLETED,
    UPLOAD_SESSIONS_INITIATED, record_upload_error,
};
use bytes::Bytes;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use studiolink_core::config::UploadConfig;
use studiolink_core::{
    AssemblyError, ChunkInsert, MediaDescriptor, NewUploadSession, SessionId, UploadSession,
    UploadStatus, UserId,
};
use studiolink_registry::{RegistryError, SessionRegistry};
use time::OffsetDateTime;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

/// Orchestrates chunked upload sessions.
#[derive(Clone)]
pub struct UploadService {
    registry: Arc<dyn SessionRegistry>,
    tenancy: Arc<dyn TenancyCheck>,
    ingestion: Arc<dyn MediaIngestion>,
    config: Arc<UploadConfig>,
}

impl UploadService {
    pub fn new(
        config: UploadConfig,
        registry: Arc<dyn SessionRegistry>,
        tenancy: Arc<dyn TenancyCheck>,
        ingestion: Arc<dyn MediaIngestion>,
    ) -> Self {
        crate::metrics::register_metrics();
        Self {
            registry,
            tenancy,
            ingestion,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<dyn SessionRegistry> {
        &self.registry
    }

    /// Open a new upload session for `request.uploader_id` on behalf of
    /// `request.tenant_id`.
    #[tracing::instrument(
        skip(self, request, cancel),
        fields(tenant_id = %request.tenant_id, uploader_id = %request.uploader_id)
    )]
    pub async fn initiate_upload(
        &self,
        request: NewUploadSession,
        cancel: &CancellationToken,
    ) -> UploadResult<UploadStatus> {
        let result = self.initiate_inner(request, cancel).await;
        record_failure(&result);
        result
    }

    async fn initiate_inner(
        &self,
        request: NewUploadSession,
        cancel: &CancellationToken,
    ) -> UploadResult<UploadStatus> {
        request.validate()?;

        let is_member = run_cancellable(
            cancel,
            self.tenancy.is_member(&request.uploader_id, &request.tenant_id),
        )
        .await?
        .map_err(UploadError::TenancyCheck)?;
        if !is_member {
            tracing::warn!("Uploader is not a member of the tenant");
            return Err(UploadError::Unauthorized(format!(
                "user {} is not a member of tenant {}",
                request.uploader_id, request.tenant_id
            )));
        }

        let session = Arc::new(UploadSession::new(request));
        self.registry.create(session.clone()).await?;

        UPLOAD_SESSIONS_INITIATED.inc();
        ACTIVE_UPLOAD_SESSIONS.inc();
        tracing::info!(
            session_id = %session.id(),
            total_size = session.total_size(),
            total_chunks = session.total_chunks(),
            media_kind = session.media_kind().as_str(),
            "Upload session initiated"
        );

        Ok(session.status())
    }

    /// Buffer one chunk of an upload.
    ///
    /// Retrying an index that was already received returns the current
    /// progress without reading `body`.
    #[tracing::instrument(skip(self, body, caller, cancel), fields(session_id = %session_id))]
    pub async fn upload_chunk<R>(
        &self,
        session_id: SessionId,
        chunk_index: u32,
        body: R,
        caller: &UserId,
        cancel: &CancellationToken,
    ) -> UploadResult<UploadStatus>
    where
        R: AsyncRead + Unpin + Send,
    {
        let result = self
            .upload_chunk_inner(session_id, chunk_index, body, caller, cancel)
            .await;
        record_failure(&result);
        result
    }

    async fn upload_chunk_inner<R>(
        &self,
        session_id: SessionId,
        chunk_index: u32,
        body: R,
        caller: &UserId,
        cancel: &CancellationToken,
    ) -> UploadResult<UploadStatus>
    where
        R: AsyncRead + Unpin + Send,
    {
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let session = self.load_owned(session_id, caller).await?;
        self.check_size_ceiling(&session)?;

        if chunk_index >= session.total_chunks() {
            return Err(UploadError::InvalidState(format!(
                "chunk index {chunk_index} is outside 0..{}",
                session.total_chunks()
            )));
        }

        if session.chunks().contains(chunk_index) {
            CHUNKS_DUPLICATE.inc();
            tracing::debug!("Chunk already received, ignoring retry");
            return Ok(session.status());
        }

        let data = read_chunk(body, self.config.max_chunk_request_size, cancel).await?;
        let len = data.len() as u64;

        // Range was checked above, so the core only reports buffer outcomes here
        let outcome = session
            .accept_chunk(chunk_index, data)
            .map_err(|e| UploadError::InvalidState(e.to_string()))?;

        match outcome {
            ChunkInsert::Inserted => {
                CHUNKS_ACCEPTED.inc();
                BYTES_BUFFERED.inc_by(len);
                self.registry
                    .update(session.clone())
                    .await
                    .map_err(|e| match e {
                        RegistryError::NotFound(_) => UploadError::NotFound(format!(
                            "upload session {session_id} was removed while the chunk was in flight"
                        )),
                        other => UploadError::Registry(other),
                    })?;
                tracing::debug!(
                    chunk_bytes = len,
                    uploaded_chunks = session.uploaded_chunks(),
                    total_chunks = session.total_chunks(),
                    "Chunk buffered"
                );
            }
            ChunkInsert::Duplicate => {
                CHUNKS_DUPLICATE.inc();
                tracing::debug!("Concurrent retry stored the chunk first");
            }
            ChunkInsert::Overflow {
                buffered,
                attempted,
                limit,
            } => {
                tracing::warn!(
                    buffered_bytes = buffered,
                    chunk_bytes = attempted,
                    declared_size = limit,
                    "Chunk rejected: cumulative size would exceed declared total"
                );
                return Err(UploadError::InvalidState(format!(
                    "chunk of {attempted} bytes would bring the upload to {} bytes, \
                     exceeding the declared size of {limit}",
                    buffered.saturating_add(attempted)
                )));
            }
        }

        Ok(session.status())
    }

    /// Reassemble a fully uploaded session and hand it to media ingestion.
    ///
    /// Completion happens at most once. The session stays in the registry
    /// afterwards so status polls keep working.
    #[tracing::instrument(skip(self, caller, cancel), fields(session_id = %session_id))]
    pub async fn complete_upload(
        &self,
        session_id: SessionId,
        caller: &UserId,
        cancel: &CancellationToken,
    ) -> UploadResult<MediaDescriptor> {
        let result = self.complete_inner(session_id, caller, cancel).await;
        record_failure(&result);
        result
    }

    async fn complete_inner(
        &self,
        session_id: SessionId,
        caller: &UserId,
        cancel: &CancellationToken,
    ) -> UploadResult<MediaDescriptor> {
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let session = self.load_owned(session_id, caller).await?;

        if session.is_completed() {
            return Err(UploadError::InvalidState(format!(
                "upload session {session_id} is already completed"
            )));
        }

        if !session.has_all_chunks() {
            return Err(UploadError::InvalidState(format!(
                "upload incomplete: received {} of {} chunks",
                session.uploaded_chunks(),
                session.total_chunks()
            )));
        }

        self.check_size_ceiling(&session)?;
        let declared_size = addressable_size(session.total_size())?;

        if !session.begin_completion() {
            return Err(UploadError::InvalidState(format!(
                "upload session {session_id} is already completed or completing"
            )));
        }

        let start = Instant::now();
        match self.finish_completion(&session, declared_size, cancel).await {
            Ok(descriptor) => {
                UPLOAD_COMPLETE_DURATION.observe(start.elapsed().as_secs_f64());
                Ok(descriptor)
            }
            Err(e) => {
                session.abort_completion();
                Err(e)
            }
        }
    }

    async fn finish_completion(
        &self,
        session: &Arc<UploadSession>,
        declared_size: usize,
        cancel: &CancellationToken,
    ) -> UploadResult<MediaDescriptor> {
        let content = session
            .chunks()
            .assemble(session.total_chunks(), declared_size)
            .map_err(|e| {
                if e.is_integrity_failure() {
                    INTEGRITY_FAILURES.inc();
                    tracing::error!(
                        declared_size = session.total_size(),
                        error = %e,
                        "Reassembly integrity check failed"
                    );
                }
                assembly_error(e)
            })?;

        // Ingestion is not interrupted once started
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let request = IngestRequest {
            tenant_id: session.tenant_id().clone(),
            uploader_id: session.uploader_id().clone(),
            content,
            file_name: session.file_name().to_string(),
            content_type: session.content_type().to_string(),
            declared_size: session.total_size(),
            description: session.description().map(str::to_string),
        };
        let descriptor = self.ingestion.ingest(request).await.map_err(|e| {
            tracing::warn!(error = %e, "Media ingestion failed");
            UploadError::Ingestion(e)
        })?;

        session.mark_completed(OffsetDateTime::now_utc());
        if let Err(e) = self.registry.update(session.clone()).await {
            // Media is already persisted, so the caller still gets the descriptor
            tracing::warn!(error = %e, "Session disappeared during completion");
        }

        UPLOAD_SESSIONS_COMPLETED.inc();
        tracing::info!(
            media_id = %descriptor.media_id,
            size_bytes = session.total_size(),
            "Upload completed"
        );

        Ok(descriptor)
    }

    /// Current progress of a session.
    #[tracing::instrument(skip(self, caller, cancel), fields(session_id = %session_id))]
    pub async fn get_status(
        &self,
        session_id: SessionId,
        caller: &UserId,
        cancel: &CancellationToken,
    ) -> UploadResult<UploadStatus> {
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }
        let result = self
            .load_owned(session_id, caller)
            .await
            .map(|session| session.status());
        record_failure(&result);
        result
    }

    /// Drop a session and its buffered chunks immediately.
    #[tracing::instrument(skip(self, caller, cancel), fields(session_id = %session_id))]
    pub async fn cancel_upload(
        &self,
        session_id: SessionId,
        caller: &UserId,
        cancel: &CancellationToken,
    ) -> UploadResult<()> {
        let result = self.cancel_inner(session_id, caller, cancel).await;
        record_failure(&result);
        result
    }

    async fn cancel_inner(
        &self,
        session_id: SessionId,
        caller: &UserId,
        cancel: &CancellationToken,
    ) -> UploadResult<()> {
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        self.load_owned(session_id, caller).await?;

        if let Some(removed) = self.registry.delete(session_id).await? {
            UPLOAD_SESSIONS_CANCELLED.inc();
            ACTIVE_UPLOAD_SESSIONS.dec();
            tracing::info!(
                freed_bytes = removed.chunks().buffered_bytes(),
                uploaded_chunks = removed.uploaded_chunks(),
                "Upload session cancelled"
            );
        }
        Ok(())
    }

    /// Fetch a session and verify `caller` is its uploader.
    async fn load_owned(
        &self,
        session_id: SessionId,
        caller: &UserId,
    ) -> UploadResult<Arc<UploadSession>> {
        let session = self
            .registry
            .get(session_id)
            .await?
            .ok_or_else(|| UploadError::NotFound(format!("upload session {session_id} not found")))?;

        if !session.is_owned_by(caller) {
            tracing::warn!(caller = %caller, "Caller is not the session's uploader");
            return Err(UploadError::Unauthorized(
                "upload session belongs to a different user".to_string(),
            ));
        }

        Ok(session)
    }

    fn check_size_ceiling(&self, session: &UploadSession) -> UploadResult<()> {
        let kind = session.media_kind();
        let ceiling = self.config.max_size_for(kind);
        if session.total_size() > ceiling {
            return Err(UploadError::InvalidState(format!(
                "declared size {} exceeds the {} limit of {} bytes",
                session.total_size(),
                kind.as_str(),
                ceiling
            )));
        }
        Ok(())
    }
}

/// Read one chunk body, bounded to `limit` bytes, aborting if `cancel` fires.
///
/// Nothing is recorded on any failure path; the partially read buffer is
/// dropped.
async fn read_chunk<R>(body: R, limit: u64, cancel: &CancellationToken) -> UploadResult<Bytes>
where
    R: AsyncRead + Unpin + Send,
{
    let mut buf = Vec::new();
    let mut limited = body.take(limit.saturating_add(1));

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::debug!("Chunk read cancelled");
            return Err(UploadError::Cancelled);
        }
        read = limited.read_to_end(&mut buf) => {
            read.map_err(|e| UploadError::InputInvalid(format!("failed to read chunk: {e}")))?;
        }
    }

    if buf.len() as u64 > limit {
        return Err(UploadError::InputInvalid(format!(
            "chunk exceeds the per-request limit of {limit} bytes"
        )));
    }

    Ok(Bytes::from(buf))
}

async fn run_cancellable<F>(cancel: &CancellationToken, fut: F) -> UploadResult<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(UploadError::Cancelled),
        out = fut => Ok(out),
    }
}

/// Convert a declared size to an in-memory buffer length.
fn addressable_size(total_size: u64) -> UploadResult<usize> {
    usize::try_from(total_size)
        .ok()
        .filter(|size| *size <= isize::MAX as usize)
        .ok_or_else(|| {
            UploadError::InvalidState(format!(
                "declared size {total_size} exceeds the addressable buffer limit"
            ))
        })
}

fn assembly_error(e: AssemblyError) -> UploadError {
    match e {
        AssemblyError::MissingChunk { index } => {
            UploadError::InvalidState(format!("chunk {index} has not been buffered"))
        }
        other => UploadError::InvalidState(format!("reassembly failed: {other}")),
    }
}

fn record_failure<T>(result: &UploadResult<T>) {
    if let Err(e) = result {
        record_upload_error(e.code());
    }
}
