//! Worker startup path.
//!
//! `run_worker` is what the discovery loop calls for every configured
//! worker: probe it, claim its id in the registration guard, start its
//! transport, and spawn a monitor. `start_instance` is the part shared
//! with monitor-driven restarts, which reuse the already claimed id.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{error, info};

use warpgrid_health::{BoxFuture, CapabilityManifest, HealthProbe};
use warpgrid_state::WebhookWorker;

use crate::cleanup::{CleanupChain, ReleaseHandle};
use crate::collab::{WorkerOpts, WorkerRepository, WorkerTransport, WorkerUpdate};
use crate::config::ControllerConfig;
use crate::error::{WebhookError, WebhookResult};
use crate::monitor::WorkerMonitor;
use crate::registry::RegistrationGuard;

/// Collaborators and settings shared by the controller and every monitor.
pub(crate) struct WebhookContext {
    pub(crate) repository: Arc<dyn WorkerRepository>,
    pub(crate) transport: Arc<dyn WorkerTransport>,
    pub(crate) probe: Arc<dyn HealthProbe>,
    pub(crate) registry: RegistrationGuard,
    pub(crate) config: ControllerConfig,
}

/// A started worker: the release chain for its transport and the shutdown
/// signal of the monitor supervising it.
pub(crate) struct WorkerInstance {
    shutdown_tx: watch::Sender<bool>,
    chain: CleanupChain,
}

impl WorkerInstance {
    /// Stop the monitor, then run the chain.
    pub(crate) async fn release(self) -> WebhookResult<()> {
        let _ = self.shutdown_tx.send(true);
        self.chain.run().await
    }
}

/// The current instance for one worker id.
///
/// Shared between the controller's release handle and the worker's
/// monitor, which swaps in a replacement when it restarts the worker.
/// `None` once released, or after a restart that failed.
pub(crate) type WorkerSlot = Arc<Mutex<Option<WorkerInstance>>>;

impl WebhookContext {
    /// Probe a worker once, attributing failures to it.
    pub(crate) async fn probe_worker(
        &self,
        tenant_id: &str,
        worker: &WebhookWorker,
    ) -> WebhookResult<CapabilityManifest> {
        self.probe
            .probe(&worker.url)
            .await
            .map_err(|source| WebhookError::Probe {
                tenant_id: tenant_id.to_string(),
                worker_id: worker.id.clone(),
                source,
            })
    }

    /// Write a worker's active flag. Failures are logged, not returned.
    pub(crate) async fn set_active(&self, tenant_id: &str, worker_id: &str, is_active: bool) {
        let update = WorkerUpdate { is_active };
        if let Err(e) = self
            .repository
            .update_worker(tenant_id, worker_id, update)
            .await
        {
            error!(%tenant_id, %worker_id, is_active, error = %e, "could not update worker");
        }
    }

    /// Start a worker unless this controller already did.
    ///
    /// Returns `Ok(None)` for an already registered worker. A worker whose
    /// transport fails to start keeps its registration and is not retried
    /// by later scans.
    pub(crate) async fn run_worker(
        self: &Arc<Self>,
        tenant_id: &str,
        worker: &WebhookWorker,
        token: &str,
    ) -> WebhookResult<Option<ReleaseHandle>> {
        let manifest = self.probe_worker(tenant_id, worker).await?;

        if !self.registry.try_register(&worker.id) {
            return Ok(None);
        }

        let slot: WorkerSlot = Arc::default();
        {
            // Hold the slot until it is filled so the new monitor cannot
            // observe it empty.
            let mut current = slot.lock().await;
            let instance = start_instance(
                Arc::clone(self),
                tenant_id.to_string(),
                worker.clone(),
                token.to_string(),
                manifest,
                Arc::clone(&slot),
            )
            .await?;
            *current = Some(instance);
        }

        let label = format!("webhook worker {} of tenant {tenant_id}", worker.id);
        Ok(Some(ReleaseHandle::new(label, move || async move {
            let instance = slot.lock().await.take();
            match instance {
                Some(instance) => instance.release().await.map_err(anyhow::Error::from),
                None => Ok(()),
            }
        })))
    }
}

/// Start the transport for `worker` and spawn its monitor with `manifest`
/// as the capability baseline.
///
/// Boxed because the monitor it spawns may call back into it on restart.
pub(crate) fn start_instance(
    ctx: Arc<WebhookContext>,
    tenant_id: String,
    worker: WebhookWorker,
    token: String,
    manifest: CapabilityManifest,
    slot: WorkerSlot,
) -> BoxFuture<'static, WebhookResult<WorkerInstance>> {
    Box::pin(async move {
        let opts = WorkerOpts {
            token: token.clone(),
            id: worker.id.clone(),
            secret: worker.secret.clone(),
            url: worker.url.clone(),
            tenant_id: tenant_id.clone(),
            actions: manifest.actions.clone(),
            workflows: manifest.workflows.clone(),
        };

        let release = ctx
            .transport
            .start_worker(opts)
            .await
            .map_err(|source| WebhookError::Startup {
                worker_id: worker.id.clone(),
                source,
            })?;

        let mut chain = CleanupChain::new();
        chain.push(release);

        ctx.set_active(&tenant_id, &worker.id, true).await;

        info!(
            %tenant_id,
            worker_id = %worker.id,
            actions = manifest.actions.len(),
            workflows = manifest.workflows.len(),
            "webhook worker started"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let monitor = WorkerMonitor::new(
            Arc::clone(&ctx),
            tenant_id,
            worker,
            token,
            manifest.fingerprint(),
            slot,
        );
        tokio::spawn(monitor.run(shutdown_rx));

        Ok(WorkerInstance { shutdown_tx, chain })
    })
}
