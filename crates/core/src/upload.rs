//! Upload session types and lifecycle.
//!
//! An [`UploadSession`] is shared between concurrent chunk requests and the
//! expiry sweeper, so every mutable field uses interior mutability and every
//! mutation goes through an explicit method on the session.

use crate::identity::{TenantId, UserId};
use crate::media::MediaKind;
use bytes::{Bytes, BytesMut};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{OnceLock, RwLock};
use time::OffsetDateTime;
use uuid::Uuid;

/// Unique identifier for an upload session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidSessionId(format!("{s:?}: {e}")))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parameters fixed when a session is created.
#[derive(Clone, Debug)]
pub struct NewUploadSession {
    pub tenant_id: TenantId,
    pub uploader_id: UserId,
    pub file_name: String,
    pub content_type: String,
    pub description: Option<String>,
    /// Declared size of the whole file in bytes.
    pub total_size: u64,
    /// Declared number of chunks the file is split into.
    pub total_chunks: u32,
}

impl NewUploadSession {
    /// Check the declared parameters are usable for an upload.
    pub fn validate(&self) -> crate::Result<()> {
        if self.file_name.trim().is_empty() {
            return Err(crate::Error::InvalidUpload(
                "file name must not be empty".to_string(),
            ));
        }
        if self.content_type.trim().is_empty() {
            return Err(crate::Error::InvalidUpload(
                "content type must not be empty".to_string(),
            ));
        }
        if self.total_size == 0 {
            return Err(crate::Error::InvalidUpload(
                "total size must be greater than zero".to_string(),
            ));
        }
        if self.total_chunks == 0 {
            return Err(crate::Error::InvalidUpload(
                "total chunks must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of offering a chunk to a [`ChunkBuffer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkInsert {
    /// The chunk was stored and its index recorded.
    Inserted,
    /// The index was already present; nothing changed.
    Duplicate,
    /// Storing the chunk would push the buffered total past the limit.
    Overflow {
        buffered: u64,
        attempted: u64,
        limit: u64,
    },
}

/// Reasons reassembly can fail.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AssemblyError {
    #[error("chunk {index} is not buffered")]
    MissingChunk { index: u32 },

    #[error("chunk {index} ({len} bytes) overflows the {remaining} bytes left of the declared size")]
    ChunkOverflow { index: u32, len: u64, remaining: u64 },

    #[error("assembled length {actual} does not match declared size {expected}")]
    LengthMismatch { expected: u64, actual: u64 },
}

impl AssemblyError {
    /// Whether this failure indicates corrupted data rather than an upload in flight.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            Self::ChunkOverflow { .. } | Self::LengthMismatch { .. }
        )
    }
}

/// Per-session chunk bookkeeping.
///
/// `received` and `chunks` always hold the same keys: an index is added to
/// `received` only while the write guard for the same key in `chunks` is held.
#[derive(Default)]
pub struct ChunkBuffer {
    received: DashSet<u32>,
    chunks: DashMap<u32, Bytes>,
    buffered: AtomicU64,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, index: u32) -> bool {
        self.received.contains(&index)
    }

    /// Number of distinct chunk indices received.
    pub fn received_count(&self) -> usize {
        self.received.len()
    }

    /// Total bytes currently buffered.
    pub fn buffered_bytes(&self) -> u64 {
        self.buffered.load(Ordering::Acquire)
    }

    /// Sorted snapshot of received indices.
    pub fn received_indices(&self) -> Vec<u32> {
        let mut indices: Vec<u32> = self.received.iter().map(|i| *i).collect();
        indices.sort_unstable();
        indices
    }

    /// Indices in `0..total_chunks` not yet received.
    pub fn missing_indices(&self, total_chunks: u32) -> Vec<u32> {
        (0..total_chunks).filter(|i| !self.contains(*i)).collect()
    }

    /// Store `data` under `index` unless the index is already present or the
    /// buffered total would exceed `limit`.
    ///
    /// The byte budget is reserved with a compare-and-swap before the index is
    /// claimed and released again if another request claimed it first.
    pub fn insert(&self, index: u32, data: Bytes, limit: u64) -> ChunkInsert {
        if self.contains(index) {
            return ChunkInsert::Duplicate;
        }

        let len = data.len() as u64;
        let reserved = self
            .buffered
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_add(len).filter(|total| *total <= limit)
            });
        if let Err(buffered) = reserved {
            return ChunkInsert::Overflow {
                buffered,
                attempted: len,
                limit,
            };
        }

        match self.chunks.entry(index) {
            Entry::Occupied(_) => {
                self.buffered.fetch_sub(len, Ordering::AcqRel);
                ChunkInsert::Duplicate
            }
            Entry::Vacant(entry) => {
                let guard = entry.insert(data);
                self.received.insert(index);
                drop(guard);
                ChunkInsert::Inserted
            }
        }
    }

    /// Concatenate chunks `0..total_chunks` in index order.
    ///
    /// Every chunk must fit in the space left of `declared_size`, and the
    /// result must be exactly `declared_size` bytes long.
    pub fn assemble(&self, total_chunks: u32, declared_size: usize) -> Result<Bytes, AssemblyError> {
        let mut out = BytesMut::with_capacity(declared_size);

        for index in 0..total_chunks {
            let chunk = self
                .chunks
                .get(&index)
                .ok_or(AssemblyError::MissingChunk { index })?;
            let remaining = declared_size - out.len();
            if chunk.len() > remaining {
                return Err(AssemblyError::ChunkOverflow {
                    index,
                    len: chunk.len() as u64,
                    remaining: remaining as u64,
                });
            }
            out.extend_from_slice(chunk.value());
        }

        if out.len() != declared_size {
            return Err(AssemblyError::LengthMismatch {
                expected: declared_size as u64,
                actual: out.len() as u64,
            });
        }

        Ok(out.freeze())
    }
}

impl fmt::Debug for ChunkBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkBuffer")
            .field("received", &self.received_count())
            .field("buffered_bytes", &self.buffered_bytes())
            .finish()
    }
}

/// Server-side record of one in-progress chunked upload.
pub struct UploadSession {
    id: SessionId,
    tenant_id: TenantId,
    uploader_id: UserId,
    file_name: String,
    content_type: String,
    description: Option<String>,
    total_size: u64,
    total_chunks: u32,
    created_at: OffsetDateTime,
    last_activity_at: RwLock<OffsetDateTime>,
    completed_at: OnceLock<OffsetDateTime>,
    completing: AtomicBool,
    chunks: ChunkBuffer,
}

impl UploadSession {
    /// Create a new session with a fresh ID and no chunks.
    pub fn new(params: NewUploadSession) -> Self {
        Self::new_at(params, OffsetDateTime::now_utc())
    }

    /// Create a new session as if it had been created at `now`.
    pub fn new_at(params: NewUploadSession, now: OffsetDateTime) -> Self {
        Self {
            id: SessionId::new(),
            tenant_id: params.tenant_id,
            uploader_id: params.uploader_id,
            file_name: params.file_name,
            content_type: params.content_type,
            description: params.description,
            total_size: params.total_size,
            total_chunks: params.total_chunks,
            created_at: now,
            last_activity_at: RwLock::new(now),
            completed_at: OnceLock::new(),
            completing: AtomicBool::new(false),
            chunks: ChunkBuffer::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn uploader_id(&self) -> &UserId {
        &self.uploader_id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn media_kind(&self) -> MediaKind {
        MediaKind::from_content_type(&self.content_type)
    }

    pub fn chunks(&self) -> &ChunkBuffer {
        &self.chunks
    }

    pub fn is_owned_by(&self, user: &UserId) -> bool {
        self.uploader_id == *user
    }

    pub fn last_activity_at(&self) -> OffsetDateTime {
        *self
            .last_activity_at
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Refresh the activity timestamp. Never moves it backwards.
    pub fn touch(&self, now: OffsetDateTime) {
        let mut last = self
            .last_activity_at
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if now > *last {
            *last = now;
        }
    }

    /// Offer a chunk to the session's buffer.
    ///
    /// Returns [`crate::Error::InvalidUpload`] when the index is outside
    /// `0..total_chunks`. Refreshes the activity timestamp when the chunk is
    /// stored.
    pub fn accept_chunk(&self, index: u32, data: Bytes) -> crate::Result<ChunkInsert> {
        if index >= self.total_chunks {
            return Err(crate::Error::InvalidUpload(format!(
                "chunk index {index} is outside 0..{}",
                self.total_chunks
            )));
        }

        let outcome = self.chunks.insert(index, data, self.total_size);
        if outcome == ChunkInsert::Inserted {
            self.touch(OffsetDateTime::now_utc());
        }
        Ok(outcome)
    }

    pub fn uploaded_chunks(&self) -> u32 {
        // received_count never exceeds total_chunks, which is a u32
        self.chunks.received_count() as u32
    }

    pub fn has_all_chunks(&self) -> bool {
        self.uploaded_chunks() >= self.total_chunks
    }

    pub fn completed_at(&self) -> Option<OffsetDateTime> {
        self.completed_at.get().copied()
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.get().is_some()
    }

    pub fn is_completing(&self) -> bool {
        self.completing.load(Ordering::Acquire)
    }

    /// Claim the right to complete this session.
    ///
    /// Returns `false` when the session is already completed or another
    /// caller holds the claim.
    pub fn begin_completion(&self) -> bool {
        if self.is_completed() {
            return false;
        }
        if self
            .completing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        // Another caller may have finished between the check and the claim.
        if self.is_completed() {
            self.completing.store(false, Ordering::Release);
            return false;
        }
        true
    }

    /// Release a completion claim without completing.
    pub fn abort_completion(&self) {
        self.completing.store(false, Ordering::Release);
    }

    /// Record successful completion. Returns `false` if it was already set.
    pub fn mark_completed(&self, now: OffsetDateTime) -> bool {
        let first = self.completed_at.set(now).is_ok();
        self.completing.store(false, Ordering::Release);
        first
    }

    /// Whether the sweeper may reclaim this session at `now`.
    ///
    /// Completed sessions and sessions with a completion in flight are never
    /// eligible.
    pub fn is_abandoned(&self, now: OffsetDateTime, timeout: time::Duration) -> bool {
        !self.is_completed() && !self.is_completing() && now - self.last_activity_at() > timeout
    }

    /// Point-in-time progress snapshot.
    pub fn status(&self) -> UploadStatus {
        let uploaded_chunks = self.uploaded_chunks();
        UploadStatus {
            session_id: self.id,
            file_name: self.file_name.clone(),
            content_type: self.content_type.clone(),
            media_kind: self.media_kind(),
            total_size: self.total_size,
            total_chunks: self.total_chunks,
            uploaded_chunks,
            progress_percent: progress_percent(uploaded_chunks, self.total_chunks),
            buffered_bytes: self.chunks.buffered_bytes(),
            missing_chunks: self.chunks.missing_indices(self.total_chunks),
            is_complete: self.is_completed(),
            created_at: self.created_at,
            last_activity_at: self.last_activity_at(),
            completed_at: self.completed_at(),
        }
    }
}

impl fmt::Debug for UploadSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadSession")
            .field("id", &self.id)
            .field("tenant_id", &self.tenant_id)
            .field("uploader_id", &self.uploader_id)
            .field("file_name", &self.file_name)
            .field("total_size", &self.total_size)
            .field("total_chunks", &self.total_chunks)
            .field("chunks", &self.chunks)
            .field("completed_at", &self.completed_at())
            .finish()
    }
}

/// Percentage of chunks received, rounded to two decimals.
pub fn progress_percent(uploaded: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = f64::from(uploaded) / f64::from(total) * 100.0;
    (pct * 100.0).round() / 100.0
}

/// Progress summary returned by every orchestrator operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UploadStatus {
    pub session_id: SessionId,
    pub file_name: String,
    pub content_type: String,
    pub media_kind: MediaKind,
    pub total_size: u64,
    pub total_chunks: u32,
    pub uploaded_chunks: u32,
    pub progress_percent: f64,
    pub buffered_bytes: u64,
    /// Indices not yet received, ascending. Lets clients resume.
    pub missing_chunks: Vec<u32>,
    pub is_complete: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}
