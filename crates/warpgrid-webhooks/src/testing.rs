//! In-memory collaborators for controller and monitor tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use warpgrid_health::{BoxFuture, CapabilityManifest, HealthProbe, ProbeError, ProbeResult};
use warpgrid_state::{TenantId, WebhookWorker};

use crate::cleanup::ReleaseHandle;
use crate::collab::{CredentialIssuer, WorkerOpts, WorkerRepository, WorkerTransport, WorkerUpdate};
use crate::config::ControllerConfig;
use crate::controller::{Controller, ControllerDeps};

pub(crate) const PROBE_INTERVAL: Duration = Duration::from_secs(10);
pub(crate) const SCAN_INTERVAL: Duration = Duration::from_secs(30);

pub(crate) fn manifest(actions: &[&str], workflows: &[&str]) -> CapabilityManifest {
    CapabilityManifest::new(actions.iter().copied(), workflows.iter().copied())
}

pub(crate) fn worker(tenant_id: &str, id: &str) -> WebhookWorker {
    WebhookWorker {
        id: id.to_string(),
        tenant_id: tenant_id.to_string(),
        url: format!("http://{id}.workers.test/webhook"),
        secret: format!("{id}-secret"),
        created_at: 0,
        updated_at: 0,
    }
}

/// Probe whose answer per URL is set by the test.
#[derive(Default)]
pub(crate) struct ScriptedProbe {
    answers: Mutex<HashMap<String, Result<CapabilityManifest, u16>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedProbe {
    pub(crate) fn healthy(&self, url: &str, manifest: CapabilityManifest) {
        self.answers.lock().unwrap().insert(url.to_string(), Ok(manifest));
    }

    /// Answer with a non-200 status.
    pub(crate) fn failing(&self, url: &str) {
        self.answers.lock().unwrap().insert(url.to_string(), Err(503));
    }

    pub(crate) fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

impl HealthProbe for ScriptedProbe {
    fn probe<'a>(&'a self, url: &'a str) -> BoxFuture<'a, ProbeResult<CapabilityManifest>> {
        *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;
        let answer = match self.answers.lock().unwrap().get(url) {
            Some(Ok(manifest)) => Ok(manifest.clone()),
            Some(Err(status)) => Err(ProbeError::UnhealthyStatus(*status)),
            None => Err(ProbeError::Unreachable(format!("no route to {url}"))),
        };
        Box::pin(async move { answer })
    }
}

/// Repository backed by plain collections, recording every status write.
#[derive(Default)]
pub(crate) struct MemoryRepository {
    tenants: Mutex<Vec<TenantId>>,
    workers: Mutex<HashMap<TenantId, Vec<WebhookWorker>>>,
    broken_tenants: Mutex<HashSet<TenantId>>,
    tenants_unavailable: AtomicBool,
    updates: Mutex<Vec<(String, String, bool)>>,
}

impl MemoryRepository {
    pub(crate) fn add_worker(&self, worker: WebhookWorker) {
        let mut tenants = self.tenants.lock().unwrap();
        if !tenants.contains(&worker.tenant_id) {
            tenants.push(worker.tenant_id.clone());
        }
        self.workers
            .lock()
            .unwrap()
            .entry(worker.tenant_id.clone())
            .or_default()
            .push(worker);
    }

    /// Make listing this tenant's workers fail.
    pub(crate) fn break_tenant(&self, tenant_id: &str) {
        let mut tenants = self.tenants.lock().unwrap();
        if !tenants.iter().any(|t| t == tenant_id) {
            tenants.push(tenant_id.to_string());
        }
        self.broken_tenants.lock().unwrap().insert(tenant_id.to_string());
    }

    /// Make listing tenants fail.
    pub(crate) fn break_tenant_listing(&self) {
        self.tenants_unavailable.store(true, Ordering::SeqCst);
    }

    /// Status writes for one worker, oldest first.
    pub(crate) fn updates_for(&self, worker_id: &str) -> Vec<bool> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, w, _)| w == worker_id)
            .map(|(_, _, active)| *active)
            .collect()
    }
}

impl WorkerRepository for MemoryRepository {
    fn list_tenants(&self) -> BoxFuture<'_, anyhow::Result<Vec<TenantId>>> {
        let result = if self.tenants_unavailable.load(Ordering::SeqCst) {
            Err(anyhow::anyhow!("tenant table unavailable"))
        } else {
            Ok(self.tenants.lock().unwrap().clone())
        };
        Box::pin(async move { result })
    }

    fn list_webhook_workers<'a>(
        &'a self,
        tenant_id: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Vec<WebhookWorker>>> {
        let result = if self.broken_tenants.lock().unwrap().contains(tenant_id) {
            Err(anyhow::anyhow!("listing workers of {tenant_id} failed"))
        } else {
            Ok(self
                .workers
                .lock()
                .unwrap()
                .get(tenant_id)
                .cloned()
                .unwrap_or_default())
        };
        Box::pin(async move { result })
    }

    fn update_worker<'a>(
        &'a self,
        tenant_id: &'a str,
        worker_id: &'a str,
        update: WorkerUpdate,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        self.updates.lock().unwrap().push((
            tenant_id.to_string(),
            worker_id.to_string(),
            update.is_active,
        ));
        Box::pin(async { Ok::<_, anyhow::Error>(()) })
    }
}

/// Transport that counts starts and releases per worker.
#[derive(Default)]
pub(crate) struct CountingTransport {
    started: Mutex<Vec<WorkerOpts>>,
    released: Arc<Mutex<Vec<String>>>,
    refuse_start: Mutex<HashSet<String>>,
    refuse_release: Arc<Mutex<HashSet<String>>>,
    release_attempts: Arc<AtomicUsize>,
}

impl CountingTransport {
    pub(crate) fn refuse_start(&self, worker_id: &str) {
        self.refuse_start.lock().unwrap().insert(worker_id.to_string());
    }

    pub(crate) fn refuse_release(&self, worker_id: &str) {
        self.refuse_release.lock().unwrap().insert(worker_id.to_string());
    }

    /// Options of every successful start, oldest first.
    pub(crate) fn starts_of(&self, worker_id: &str) -> Vec<WorkerOpts> {
        self.started
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.id == worker_id)
            .cloned()
            .collect()
    }

    pub(crate) fn total_starts(&self) -> usize {
        self.started.lock().unwrap().len()
    }

    pub(crate) fn releases_of(&self, worker_id: &str) -> usize {
        self.released
            .lock()
            .unwrap()
            .iter()
            .filter(|w| *w == worker_id)
            .count()
    }

    pub(crate) fn release_attempts(&self) -> usize {
        self.release_attempts.load(Ordering::SeqCst)
    }
}

impl WorkerTransport for CountingTransport {
    fn start_worker(&self, opts: WorkerOpts) -> BoxFuture<'_, anyhow::Result<ReleaseHandle>> {
        let result = if self.refuse_start.lock().unwrap().contains(&opts.id) {
            Err(anyhow::anyhow!("transport for {} refused to start", opts.id))
        } else {
            let worker_id = opts.id.clone();
            self.started.lock().unwrap().push(opts);

            let released = Arc::clone(&self.released);
            let refuse = Arc::clone(&self.refuse_release);
            let attempts = Arc::clone(&self.release_attempts);
            Ok(ReleaseHandle::new(
                format!("transport {worker_id}"),
                move || async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    if refuse.lock().unwrap().contains(&worker_id) {
                        return Err(anyhow::anyhow!("transport {worker_id} refused to stop"));
                    }
                    released.lock().unwrap().push(worker_id);
                    Ok::<_, anyhow::Error>(())
                },
            ))
        };
        Box::pin(async move { result })
    }
}

/// Issuer returning `token-{tenant}`, failing for chosen tenants.
#[derive(Default)]
pub(crate) struct StaticIssuer {
    refuse: Mutex<HashSet<String>>,
}

impl StaticIssuer {
    pub(crate) fn refuse(&self, tenant_id: &str) {
        self.refuse.lock().unwrap().insert(tenant_id.to_string());
    }
}

impl CredentialIssuer for StaticIssuer {
    fn generate_tenant_token<'a>(
        &'a self,
        tenant_id: &'a str,
        _purpose: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<String>> {
        let result = if self.refuse.lock().unwrap().contains(tenant_id) {
            Err(anyhow::anyhow!("issuer unavailable"))
        } else {
            Ok(format!("token-{tenant_id}"))
        };
        Box::pin(async move { result })
    }
}

/// A controller wired to the fakes above, with handles to each fake.
pub(crate) struct Harness {
    pub(crate) repository: Arc<MemoryRepository>,
    pub(crate) transport: Arc<CountingTransport>,
    pub(crate) probe: Arc<ScriptedProbe>,
    pub(crate) issuer: Arc<StaticIssuer>,
    pub(crate) controller: Controller,
}

impl Harness {
    pub(crate) fn new() -> Self {
        let config = ControllerConfig {
            scan_interval: SCAN_INTERVAL,
            probe_interval: PROBE_INTERVAL,
            ..Default::default()
        };
        Self::with_config(config)
    }

    pub(crate) fn with_config(config: ControllerConfig) -> Self {
        let repository = Arc::new(MemoryRepository::default());
        let transport = Arc::new(CountingTransport::default());
        let probe = Arc::new(ScriptedProbe::default());
        let issuer = Arc::new(StaticIssuer::default());
        let controller = Controller::new(
            ControllerDeps {
                repository: repository.clone(),
                issuer: issuer.clone(),
                transport: transport.clone(),
                probe: probe.clone(),
            },
            config,
        );
        Self {
            repository,
            transport,
            probe,
            issuer,
            controller,
        }
    }
}
