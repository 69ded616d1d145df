//! Prometheus metrics for the upload subsystem.
//!
//! Metrics carry no tenant, user or file identifiers. Exposing them over the
//! network is the host process's concern.

use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Prometheus registry for all upload metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Session lifecycle metrics
pub static UPLOAD_SESSIONS_INITIATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "studiolink_upload_sessions_initiated_total",
        "Total number of upload sessions initiated",
    )
    .expect("metric creation failed")
});

pub static UPLOAD_SESSIONS_COMPLETED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "studiolink_upload_sessions_completed_total",
        "Total number of upload sessions completed and ingested",
    )
    .expect("metric creation failed")
});

pub static UPLOAD_SESSIONS_CANCELLED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "studiolink_upload_sessions_cancelled_total",
        "Total number of upload sessions cancelled by their uploader",
    )
    .expect("metric creation failed")
});

pub static UPLOAD_SESSIONS_EXPIRED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "studiolink_upload_sessions_expired_total",
        "Total number of abandoned upload sessions reclaimed by the sweeper",
    )
    .expect("metric creation failed")
});

// Chunk metrics
pub static CHUNKS_ACCEPTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "studiolink_chunks_accepted_total",
        "Total number of chunks buffered",
    )
    .expect("metric creation failed")
});

pub static CHUNKS_DUPLICATE: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "studiolink_chunks_duplicate_total",
        "Total number of chunk retries ignored because the index was already received",
    )
    .expect("metric creation failed")
});

pub static BYTES_BUFFERED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "studiolink_bytes_buffered_total",
        "Total chunk bytes buffered in memory",
    )
    .expect("metric creation failed")
});

// Sweeper metrics
pub static SWEEP_RUNS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "studiolink_sweep_runs_total",
        "Total number of expiry sweeps executed",
    )
    .expect("metric creation failed")
});

pub static SWEEP_BYTES_RECLAIMED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "studiolink_sweep_bytes_reclaimed_total",
        "Total buffered bytes released by expiry sweeps",
    )
    .expect("metric creation failed")
});

pub static SWEEP_ERRORS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "studiolink_sweep_errors_total",
        "Total number of per-session failures during expiry sweeps",
    )
    .expect("metric creation failed")
});

// Error metrics
pub static INTEGRITY_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "studiolink_reassembly_integrity_failures_total",
        "Total number of reassemblies rejected for chunk overflow or length mismatch",
    )
    .expect("metric creation failed")
});

pub static UPLOAD_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "studiolink_upload_errors_total",
            "Total upload errors by error code",
        ),
        &["error_code"],
    )
    .expect("metric creation failed")
});

// Current state gauges
pub static ACTIVE_UPLOAD_SESSIONS: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "studiolink_active_upload_sessions",
        "Current number of upload sessions held in memory",
    )
    .expect("metric creation failed")
});

// Timing metrics
pub static UPLOAD_COMPLETE_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "studiolink_upload_complete_duration_seconds",
            "Time taken to reassemble and ingest an upload",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the registry.
///
/// Idempotent, so every service instance may call it.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(UPLOAD_SESSIONS_INITIATED.clone()),
            Box::new(UPLOAD_SESSIONS_COMPLETED.clone()),
            Box::new(UPLOAD_SESSIONS_CANCELLED.clone()),
            Box::new(UPLOAD_SESSIONS_EXPIRED.clone()),
            Box::new(CHUNKS_ACCEPTED.clone()),
            Box::new(CHUNKS_DUPLICATE.clone()),
            Box::new(BYTES_BUFFERED.clone()),
            Box::new(SWEEP_RUNS.clone()),
            Box::new(SWEEP_BYTES_RECLAIMED.clone()),
            Box::new(SWEEP_ERRORS.clone()),
            Box::new(INTEGRITY_FAILURES.clone()),
            Box::new(UPLOAD_ERRORS.clone()),
            Box::new(ACTIVE_UPLOAD_SESSIONS.clone()),
            Box::new(UPLOAD_COMPLETE_DURATION.clone()),
        ];
        for collector in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                tracing::warn!(error = %e, "Failed to register upload metric");
            }
        }
    });
}

/// Render every registered metric in the Prometheus text format.
pub fn gather() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Helper to record upload errors by code.
pub fn record_upload_error(error_code: &str) {
    UPLOAD_ERRORS.with_label_values(&[error_code]).inc();
}
