//! Chunked upload sessions for studiolink.
//!
//! Clients open a session for one file, send its chunks in any order over
//! multiple requests, then complete the session. Completion reassembles the
//! file in index order and hands it to media ingestion. Sessions that stop
//! receiving chunks are reclaimed by a background sweeper.
//!
//! Storage of sessions is pluggable through
//! [`studiolink_registry::SessionRegistry`]; tenancy checks and media
//! persistence are supplied by the embedding process through the
//! [`TenancyCheck`] and [`MediaIngestion`] traits.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod metrics;
pub mod runtime;
pub mod service;
pub mod sweeper;
pub mod telemetry;

pub use collaborators::{BoxError, IngestRequest, MediaIngestion, TenancyCheck};
pub use error::{ErrorKind, UploadError, UploadResult};
pub use runtime::UploadRuntime;
pub use service::UploadService;
pub use sweeper::{ExpirySweeper, SweepStats};
