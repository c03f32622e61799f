//! Collaborators the controller consumes but does not implement.
//!
//! Futures are boxed so the traits stay object safe; the controller holds
//! each collaborator as an `Arc<dyn ...>`.

use warpgrid_health::BoxFuture;
use warpgrid_state::{TenantId, WebhookWorker};

use crate::cleanup::ReleaseHandle;

/// Fields the controller may write back to a worker record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerUpdate {
    pub is_active: bool,
}

/// Tenant and webhook worker persistence.
pub trait WorkerRepository: Send + Sync {
    /// List every tenant, in a stable order.
    fn list_tenants(&self) -> BoxFuture<'_, anyhow::Result<Vec<TenantId>>>;

    /// List the webhook workers configured for a tenant.
    fn list_webhook_workers<'a>(
        &'a self,
        tenant_id: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Vec<WebhookWorker>>>;

    /// Persist a status change for a worker.
    fn update_worker<'a>(
        &'a self,
        tenant_id: &'a str,
        worker_id: &'a str,
        update: WorkerUpdate,
    ) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// Issues tokens the worker transport authenticates with.
pub trait CredentialIssuer: Send + Sync {
    fn generate_tenant_token<'a>(
        &'a self,
        tenant_id: &'a str,
        purpose: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<String>>;
}

/// Everything the transport needs to serve a webhook worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOpts {
    pub token: String,
    pub id: String,
    pub secret: String,
    pub url: String,
    pub tenant_id: String,
    pub actions: Vec<String>,
    pub workflows: Vec<String>,
}

/// Starts the transport that connects a webhook worker to the control plane.
///
/// The returned handle stops that instance; the controller releases it
/// exactly once, on restart or on shutdown.
pub trait WorkerTransport: Send + Sync {
    fn start_worker(&self, opts: WorkerOpts) -> BoxFuture<'_, anyhow::Result<ReleaseHandle>>;
}
