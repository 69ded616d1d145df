//! Wiring for a running upload subsystem: the orchestrator plus its
//! background sweeper.

use crate::collaborators::{MediaIngestion, TenancyCheck};
use crate::service::UploadService;
use crate::sweeper::ExpirySweeper;
use anyhow::Context;
use std::sync::Arc;
use studiolink_core::config::UploadConfig;
use studiolink_registry::SessionRegistry;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A started upload subsystem. Must be created inside a Tokio runtime.
pub struct UploadRuntime {
    service: UploadService,
    shutdown_token: CancellationToken,
    sweeper: Option<JoinHandle<()>>,
}

impl UploadRuntime {
    /// Validate `config`, build the service and start the expiry sweeper.
    #[tracing::instrument(skip_all, fields(
        sweep_interval_secs = config.sweep_interval_secs,
        inactivity_timeout_secs = config.session_inactivity_timeout_secs
    ))]
    pub fn start(
        config: UploadConfig,
        registry: Arc<dyn SessionRegistry>,
        tenancy: Arc<dyn TenancyCheck>,
        ingestion: Arc<dyn MediaIngestion>,
    ) -> anyhow::Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!(e))
            .context("invalid upload configuration")?;

        crate::metrics::register_metrics();

        let sweeper = ExpirySweeper::new(registry.clone(), &config);
        let service = UploadService::new(config, registry, tenancy, ingestion);

        let shutdown_token = CancellationToken::new();
        let handle = sweeper.spawn(shutdown_token.clone());
        tracing::info!("Upload runtime started");

        Ok(Self {
            service,
            shutdown_token,
            sweeper: Some(handle),
        })
    }

    pub fn service(&self) -> &UploadService {
        &self.service
    }

    /// Token cancelled when shutdown begins.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Stop the sweeper and wait for it to exit.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(mut self) {
        self.shutdown_token.cancel();
        if let Some(handle) = self.sweeper.take()
            && let Err(e) = handle.await
        {
            tracing::warn!(error = %e, "Expiry sweeper task ended abnormally");
        }
        tracing::info!("Upload runtime stopped");
    }
}

impl Drop for UploadRuntime {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}
