//! Background reclamation of abandoned upload sessions.

use crate::metrics::{
    ACTIVE_UPLOAD_SESSIONS, SWEEP_BYTES_RECLAIMED, SWEEP_ERRORS, SWEEP_RUNS,
    UPLOAD_SESSIONS_EXPIRED,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use studiolink_core::UploadSession;
use studiolink_core::config::UploadConfig;
use studiolink_registry::SessionRegistry;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Outcome of a single sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepStats {
    /// Sessions inspected.
    pub sessions_scanned: u64,
    /// Sessions removed as abandoned.
    pub sessions_removed: u64,
    /// Buffered bytes released by removed sessions.
    pub bytes_reclaimed: u64,
    /// Failures encountered.
    pub errors: u64,
}

/// Periodically removes sessions with no activity inside the inactivity
/// window. Completed sessions are never removed.
#[derive(Clone)]
pub struct ExpirySweeper {
    registry: Arc<dyn SessionRegistry>,
    interval: Duration,
    timeout: time::Duration,
}

impl ExpirySweeper {
    pub fn new(registry: Arc<dyn SessionRegistry>, config: &UploadConfig) -> Self {
        Self {
            registry,
            interval: config.sweep_interval(),
            timeout: config.inactivity_timeout(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one sweep against the current time.
    pub async fn sweep(&self) -> SweepStats {
        self.sweep_at(OffsetDateTime::now_utc()).await
    }

    /// Run one sweep treating `now` as the current time.
    pub async fn sweep_at(&self, now: OffsetDateTime) -> SweepStats {
        let mut stats = SweepStats::default();
        SWEEP_RUNS.inc();

        let sessions = match self.registry.list_all().await {
            Ok(sessions) => sessions,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list upload sessions for sweep");
                stats.errors += 1;
                SWEEP_ERRORS.inc();
                return stats;
            }
        };

        let timeout = self.timeout;
        for session in sessions {
            stats.sessions_scanned += 1;
            if !session.is_abandoned(now, timeout) {
                continue;
            }

            // Re-checked under the registry's entry lock so a concurrent
            // chunk upload or completion keeps the session alive
            let still_abandoned = move |s: &UploadSession| s.is_abandoned(now, timeout);
            match self.registry.delete_if(session.id(), &still_abandoned).await {
                Ok(Some(removed)) => {
                    let freed = removed.chunks().buffered_bytes();
                    stats.sessions_removed += 1;
                    stats.bytes_reclaimed += freed;
                    UPLOAD_SESSIONS_EXPIRED.inc();
                    ACTIVE_UPLOAD_SESSIONS.dec();
                    tracing::debug!(
                        session_id = %removed.id(),
                        freed_bytes = freed,
                        last_activity_at = %removed.last_activity_at(),
                        "Removed abandoned upload session"
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        session_id = %session.id(),
                        error = %e,
                        "Failed to remove abandoned upload session"
                    );
                    stats.errors += 1;
                    SWEEP_ERRORS.inc();
                }
            }
        }

        SWEEP_BYTES_RECLAIMED.inc_by(stats.bytes_reclaimed);
        if stats.sessions_removed > 0 || stats.errors > 0 {
            tracing::info!(
                scanned = stats.sessions_scanned,
                removed = stats.sessions_removed,
                bytes_reclaimed = stats.bytes_reclaimed,
                errors = stats.errors,
                "Expiry sweep finished"
            );
        }

        stats
    }

    /// Spawn the periodic sweep loop.
    ///
    /// The loop exits once `shutdown` fires. A sweep already in progress runs
    /// to completion first.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so a fresh process
            // does not sweep before any session could have expired
            ticker.tick().await;

            tracing::info!(
                interval_secs = self.interval.as_secs(),
                timeout_secs = self.timeout.whole_seconds(),
                "Expiry sweeper started"
            );

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        self.sweep().await;
                    }
                }
            }

            tracing::info!("Expiry sweeper stopped");
        })
    }
}
