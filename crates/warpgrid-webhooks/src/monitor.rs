//! Background task that health checks one started worker.
//!
//! Every `probe_interval` the monitor probes the worker and feeds the
//! outcome to a [`FailureTracker`]. Crossing the failure threshold marks
//! the worker inactive; the first success afterwards marks it active
//! again. A successful probe whose capability fingerprint differs from the
//! baseline restarts the worker: the current instance is released, a
//! replacement is started under the same id, and this task exits.
//!
//! The loop only ends on its shutdown signal or after a restart. An
//! inactive worker keeps being probed.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use warpgrid_health::{FailureTracker, ManifestFingerprint, ProbeError, Transition};
use warpgrid_state::WebhookWorker;

use crate::worker::{start_instance, WebhookContext, WorkerSlot};

/// Whether the loop keeps going after a tick.
enum Flow {
    Continue,
    Stop,
}

/// Supervises a single started worker instance.
pub(crate) struct WorkerMonitor {
    ctx: Arc<WebhookContext>,
    tenant_id: String,
    worker: WebhookWorker,
    token: String,
    /// Fingerprints reported when this instance was started.
    baseline: ManifestFingerprint,
    tracker: FailureTracker,
    slot: WorkerSlot,
}

impl WorkerMonitor {
    pub(crate) fn new(
        ctx: Arc<WebhookContext>,
        tenant_id: String,
        worker: WebhookWorker,
        token: String,
        baseline: ManifestFingerprint,
        slot: WorkerSlot,
    ) -> Self {
        let tracker = FailureTracker::new(ctx.config.failure_threshold);
        Self {
            ctx,
            tenant_id,
            worker,
            token,
            baseline,
            tracker,
            slot,
        }
    }

    /// Probe until shut down or restarted.
    pub(crate) async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let interval = self.ctx.config.probe_interval;
        debug!(tenant_id = %self.tenant_id, worker_id = %self.worker.id, "worker monitor starting");

        loop {
            let cancelled = tokio::select! {
                _ = tokio::time::sleep(interval) => false,
                _ = shutdown.changed() => true,
            };
            if cancelled || *shutdown.borrow() {
                break;
            }

            if let Flow::Stop = self.tick(&shutdown).await {
                break;
            }
        }

        debug!(tenant_id = %self.tenant_id, worker_id = %self.worker.id, "worker monitor stopped");
    }

    async fn tick(&mut self, shutdown: &watch::Receiver<bool>) -> Flow {
        let result = self.ctx.probe.probe(&self.worker.url).await;
        // The instance may have been released while the probe was in flight.
        if *shutdown.borrow() {
            return Flow::Stop;
        }

        let manifest = match result {
            Ok(manifest) => manifest,
            Err(e) => {
                self.on_failure(&e).await;
                return Flow::Continue;
            }
        };

        self.on_success().await;

        let current = manifest.fingerprint();
        debug!(
            worker_id = %self.worker.id,
            actions = %current.actions,
            actions_last = %self.baseline.actions,
            workflows = %current.workflows,
            workflows_last = %self.baseline.workflows,
            "compared capability fingerprints"
        );

        if current != self.baseline {
            info!(
                tenant_id = %self.tenant_id,
                worker_id = %self.worker.id,
                "webhook worker capabilities changed, restarting"
            );
            self.restart(shutdown).await;
            return Flow::Stop;
        }

        Flow::Continue
    }

    async fn on_failure(&mut self, e: &ProbeError) {
        let tenant_id = &self.tenant_id;
        let worker_id = &self.worker.id;

        match self.tracker.record_failure() {
            Transition::Degraded { failures } => {
                warn!(%tenant_id, %worker_id, failures, kind = ?e.kind(), error = %e, "webhook worker failed health check, retrying");
            }
            Transition::Deactivated { failures } => {
                warn!(%tenant_id, %worker_id, failures, error = %e, "webhook worker failed too many health checks, marking as inactive");
                self.ctx.set_active(tenant_id, worker_id, false).await;
            }
            Transition::Unchanged | Transition::Recovered { .. } => {
                debug!(%tenant_id, %worker_id, failures = self.tracker.consecutive_failures(), error = %e, "webhook worker still inactive");
            }
        }
    }

    async fn on_success(&mut self) {
        if let Transition::Recovered { was_inactive } = self.tracker.record_success() {
            info!(tenant_id = %self.tenant_id, worker_id = %self.worker.id, was_inactive, "webhook worker is healthy again");
            if was_inactive {
                self.ctx.set_active(&self.tenant_id, &self.worker.id, true).await;
            }
        }
    }

    /// Replace the instance this monitor supervises.
    ///
    /// Runs with the slot locked, so the controller's release handle waits
    /// for the replacement and then releases it instead of the old one.
    async fn restart(&self, shutdown: &watch::Receiver<bool>) {
        let tenant_id = &self.tenant_id;
        let worker_id = &self.worker.id;

        let mut current = self.slot.lock().await;
        if *shutdown.borrow() {
            return;
        }
        let Some(old) = current.take() else {
            return;
        };

        if let Err(e) = old.release().await {
            error!(%tenant_id, %worker_id, error = %e, "could not cleanup webhook worker");
        }

        let manifest = match self.ctx.probe_worker(tenant_id, &self.worker).await {
            Ok(manifest) => manifest,
            Err(e) => {
                error!(%tenant_id, %worker_id, error = %e, "could not restart webhook worker");
                return;
            }
        };

        match start_instance(
            Arc::clone(&self.ctx),
            tenant_id.clone(),
            self.worker.clone(),
            self.token.clone(),
            manifest,
            Arc::clone(&self.slot),
        )
        .await
        {
            Ok(instance) => {
                *current = Some(instance);
                info!(%tenant_id, %worker_id, "webhook worker restarted");
            }
            Err(e) => {
                error!(%tenant_id, %worker_id, error = %e, "could not restart webhook worker");
            }
        }
    }
}
