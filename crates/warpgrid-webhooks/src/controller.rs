//! Webhook controller: tenant discovery and process lifecycle.
//!
//! `Controller::start` spawns the discovery loop, which scans every
//! tenant each `scan_interval` and runs the startup path for each of its
//! webhook workers. The returned [`Shutdown`] stops the loop and releases
//! every worker the controller started.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use warpgrid_health::HealthProbe;
use warpgrid_state::WebhookWorker;

use crate::cleanup::{CleanupChain, ReleaseHandle};
use crate::collab::{CredentialIssuer, WorkerRepository, WorkerTransport};
use crate::config::ControllerConfig;
use crate::error::{WebhookError, WebhookResult};
use crate::registry::RegistrationGuard;
use crate::worker::WebhookContext;

/// External collaborators the controller is wired to.
#[derive(Clone)]
pub struct ControllerDeps {
    pub repository: Arc<dyn WorkerRepository>,
    pub issuer: Arc<dyn CredentialIssuer>,
    pub transport: Arc<dyn WorkerTransport>,
    pub probe: Arc<dyn HealthProbe>,
}

/// Outcome counts of one discovery pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Tenants listed.
    pub tenants: usize,
    /// Tenants whose worker listing failed.
    pub failed_tenants: usize,
    /// Workers started during this pass.
    pub started: usize,
    /// Workers skipped because this controller already started them.
    pub already_running: usize,
    /// Workers whose probe or startup failed.
    pub failed_workers: usize,
}

/// Discovers and supervises webhook workers for every tenant.
///
/// Cheap to clone; clones share the registration guard and the list of
/// release handles.
#[derive(Clone)]
pub struct Controller {
    ctx: Arc<WebhookContext>,
    issuer: Arc<dyn CredentialIssuer>,
    /// One release handle per worker started by a scan.
    releases: Arc<Mutex<Vec<ReleaseHandle>>>,
}

impl Controller {
    pub fn new(deps: ControllerDeps, config: ControllerConfig) -> Self {
        let ctx = WebhookContext {
            repository: deps.repository,
            transport: deps.transport,
            probe: deps.probe,
            registry: RegistrationGuard::new(),
            config,
        };
        Self {
            ctx: Arc::new(ctx),
            issuer: deps.issuer,
            releases: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Spawn the discovery loop.
    ///
    /// The first scan runs one full `scan_interval` after start.
    pub fn start(&self) -> WebhookResult<Shutdown> {
        self.ctx.config.validate()?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let controller = self.clone();
        let handle = tokio::spawn(async move {
            controller.run_discovery(shutdown_rx).await;
        });

        info!(
            scan_interval_ms = self.ctx.config.scan_interval.as_millis() as u64,
            probe_interval_ms = self.ctx.config.probe_interval.as_millis() as u64,
            "webhook controller started"
        );

        Ok(Shutdown {
            controller: self.clone(),
            shutdown_tx,
            handle,
        })
    }

    async fn run_discovery(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            let cancelled = tokio::select! {
                _ = tokio::time::sleep(self.ctx.config.scan_interval) => false,
                _ = shutdown.changed() => true,
            };
            if cancelled || *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.scan_once().await {
                error!(error = %e, "error checking webhooks");
            }
        }
        debug!("webhook discovery loop stopped");
    }

    /// Run one discovery pass over every tenant.
    ///
    /// Worker listing and per-worker failures are logged and counted; they
    /// never stop the pass. Only a failed tenant listing or a failed token
    /// issuance is returned, the latter aborting the remaining tenants.
    pub async fn scan_once(&self) -> WebhookResult<ScanReport> {
        let tenants = self
            .ctx
            .repository
            .list_tenants()
            .await
            .map_err(WebhookError::Repository)?;

        let mut report = ScanReport {
            tenants: tenants.len(),
            ..Default::default()
        };

        for tenant_id in &tenants {
            let token = match self
                .issuer
                .generate_tenant_token(tenant_id, &self.ctx.config.token_purpose)
                .await
            {
                Ok(token) => token,
                Err(source) => {
                    let err = WebhookError::Credential {
                        tenant_id: tenant_id.clone(),
                        source,
                    };
                    error!(%tenant_id, error = %err, "could not generate webhook worker token, aborting scan");
                    return Err(err);
                }
            };

            let workers = match self.ctx.repository.list_webhook_workers(tenant_id).await {
                Ok(workers) => workers,
                Err(e) => {
                    error!(%tenant_id, error = %e, "could not get webhook workers");
                    report.failed_tenants += 1;
                    continue;
                }
            };

            for worker in &workers {
                match self.run_worker(tenant_id, worker, &token).await {
                    Ok(Some(release)) => {
                        self.releases.lock().await.push(release);
                        report.started += 1;
                    }
                    Ok(None) => report.already_running += 1,
                    Err(e) => {
                        error!(%tenant_id, worker_id = %worker.id, error = %e, "error running webhook worker");
                        report.failed_workers += 1;
                    }
                }
            }
        }

        debug!(?report, "webhook scan complete");
        Ok(report)
    }

    /// The worker startup path.
    ///
    /// Probes the worker, claims its id, starts its transport, and spawns
    /// its monitor. Returns `Ok(None)` without side effects if the id is
    /// already claimed. The caller owns the returned handle; scans keep
    /// theirs until shutdown.
    pub async fn run_worker(
        &self,
        tenant_id: &str,
        worker: &WebhookWorker,
        token: &str,
    ) -> WebhookResult<Option<ReleaseHandle>> {
        self.ctx.run_worker(tenant_id, worker, token).await
    }

    /// Worker ids started by this controller, sorted.
    pub fn registered_workers(&self) -> Vec<String> {
        self.ctx.registry.registered()
    }

    /// Number of release handles held for shutdown.
    pub async fn pending_releases(&self) -> usize {
        self.releases.lock().await.len()
    }

    /// Release every worker started by a scan and forget all registrations.
    ///
    /// Every handle is attempted; the first failure is returned.
    pub async fn release_all(&self) -> WebhookResult<()> {
        let chain = CleanupChain::from(std::mem::take(&mut *self.releases.lock().await));
        let count = chain.len();
        let result = chain.run().await;
        self.ctx.registry.clear();
        debug!(count, "released webhook workers");
        result
    }
}

/// Stops a started controller.
pub struct Shutdown {
    controller: Controller,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Shutdown {
    /// Stop the discovery loop, wait for an in-flight scan to finish, then
    /// release every started worker.
    ///
    /// Every release is attempted even if an earlier one fails; the first
    /// failure is returned.
    pub async fn shutdown(self) -> WebhookResult<()> {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            error!(error = %e, "webhook discovery loop did not exit cleanly");
        }

        let result = self.controller.release_all().await;
        match &result {
            Ok(()) => info!("webhook controller stopped"),
            Err(e) => error!(error = %e, "could not cleanup webhook worker"),
        }
        result
    }
}
