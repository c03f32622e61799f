//! State store adapters: `StateStore` as the worker repository, and a
//! transport that publishes started workers into the store.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use warpgrid_health::BoxFuture;
use warpgrid_state::{StateStore, TenantId, WebhookWorker, WorkerRegistration};

use crate::cleanup::ReleaseHandle;
use crate::collab::{WorkerOpts, WorkerRepository, WorkerTransport, WorkerUpdate};

impl WorkerRepository for StateStore {
    fn list_tenants(&self) -> BoxFuture<'_, anyhow::Result<Vec<TenantId>>> {
        Box::pin(async move {
            let tenants = StateStore::list_tenants(self)?;
            Ok::<Vec<TenantId>, anyhow::Error>(tenants.into_iter().map(|t| t.id).collect())
        })
    }

    fn list_webhook_workers<'a>(
        &'a self,
        tenant_id: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Vec<WebhookWorker>>> {
        Box::pin(async move {
            let workers = StateStore::list_webhook_workers(self, tenant_id)?;
            Ok::<_, anyhow::Error>(workers)
        })
    }

    fn update_worker<'a>(
        &'a self,
        tenant_id: &'a str,
        worker_id: &'a str,
        update: WorkerUpdate,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.set_worker_active(tenant_id, worker_id, update.is_active)?;
            Ok::<_, anyhow::Error>(())
        })
    }
}

/// Transport that records each started worker's capability set as a
/// [`WorkerRegistration`] and removes it on release.
#[derive(Clone)]
pub struct StoreTransport {
    store: StateStore,
}

impl StoreTransport {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }
}

impl WorkerTransport for StoreTransport {
    fn start_worker(&self, opts: WorkerOpts) -> BoxFuture<'_, anyhow::Result<ReleaseHandle>> {
        Box::pin(async move {
            let registration = WorkerRegistration {
                tenant_id: opts.tenant_id,
                worker_id: opts.id,
                url: opts.url,
                actions: opts.actions,
                workflows: opts.workflows,
                started_at: epoch_secs(),
            };
            self.store.put_registration(&registration)?;
            debug!(
                tenant_id = %registration.tenant_id,
                worker_id = %registration.worker_id,
                "worker registration stored"
            );

            let store = self.store.clone();
            let label = format!("transport for webhook worker {}", registration.worker_id);
            let release = ReleaseHandle::new(label, move || async move {
                store.delete_registration(&registration.tenant_id, &registration.worker_id)?;
                Ok::<_, anyhow::Error>(())
            });
            Ok::<_, anyhow::Error>(release)
        })
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
