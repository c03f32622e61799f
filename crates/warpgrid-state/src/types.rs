//! Domain types for the webhook state store.

use serde::{Deserialize, Serialize};

/// Unique identifier for a tenant.
pub type TenantId = String;

/// Unique identifier for a webhook worker.
pub type WorkerId = String;

/// A tenant under which webhook workers are scoped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tenant {
    pub id: TenantId,
    /// Unix timestamp (seconds) when this tenant was created.
    pub created_at: u64,
}

/// Persisted configuration of an externally hosted webhook worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookWorker {
    pub id: WorkerId,
    pub tenant_id: TenantId,
    /// Health endpoint, also the address actions are dispatched to.
    pub url: String,
    /// Shared secret used to sign requests to the worker.
    pub secret: String,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Active flag written by the webhook controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerStatus {
    pub tenant_id: TenantId,
    pub worker_id: WorkerId,
    pub is_active: bool,
    /// Unix timestamp of the last status write.
    pub updated_at: u64,
}

/// Capability set of a worker that is currently started.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerRegistration {
    pub tenant_id: TenantId,
    pub worker_id: WorkerId,
    pub url: String,
    pub actions: Vec<String>,
    pub workflows: Vec<String>,
    /// Unix timestamp when this instance was started.
    pub started_at: u64,
}

/// Build the composite key for worker-scoped tables.
pub fn worker_key(tenant_id: &str, worker_id: &str) -> String {
    format!("{tenant_id}/{worker_id}")
}

impl WebhookWorker {
    pub fn table_key(&self) -> String {
        worker_key(&self.tenant_id, &self.id)
    }
}

impl WorkerStatus {
    pub fn table_key(&self) -> String {
        worker_key(&self.tenant_id, &self.worker_id)
    }
}

impl WorkerRegistration {
    pub fn table_key(&self) -> String {
        worker_key(&self.tenant_id, &self.worker_id)
    }
}
