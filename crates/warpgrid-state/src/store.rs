//! redb-backed persistence for webhook workers.
//!
//! Provides typed CRUD operations over tenants, webhook worker records,
//! worker status, and worker registrations. All values are JSON-serialized
//! into redb's `&[u8]` value columns. The store supports both on-disk and
//! in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase, ReadableTable};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        for table in [TENANTS, WEBHOOK_WORKERS, WORKER_STATUS, WORKER_REGISTRATIONS] {
            txn.open_table(table).map_err(map_err!(Table))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Tenants ────────────────────────────────────────────────────

    /// Insert a tenant, keeping the original creation time if it exists.
    pub fn put_tenant(&self, tenant_id: &str) -> StateResult<Tenant> {
        validate_id(tenant_id)?;
        if let Some(existing) = self.get_tenant(tenant_id)? {
            return Ok(existing);
        }
        let tenant = Tenant {
            id: tenant_id.to_string(),
            created_at: epoch_secs(),
        };
        self.put_json(TENANTS, tenant_id, &tenant)?;
        debug!(%tenant_id, "tenant stored");
        Ok(tenant)
    }

    pub fn get_tenant(&self, tenant_id: &str) -> StateResult<Option<Tenant>> {
        self.get_json(TENANTS, tenant_id)
    }

    /// List all tenants, ordered by id.
    pub fn list_tenants(&self) -> StateResult<Vec<Tenant>> {
        self.list_json(TENANTS, "")
    }

    /// Delete a tenant together with its webhook workers and their status
    /// and registration records. Returns true if the tenant existed.
    pub fn delete_tenant(&self, tenant_id: &str) -> StateResult<bool> {
        let prefix = format!("{tenant_id}/");
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut tenants = txn.open_table(TENANTS).map_err(map_err!(Table))?;
            existed = tenants.remove(tenant_id).map_err(map_err!(Write))?.is_some();

            for def in [WEBHOOK_WORKERS, WORKER_STATUS, WORKER_REGISTRATIONS] {
                let mut table = txn.open_table(def).map_err(map_err!(Table))?;
                let mut keys = Vec::new();
                for entry in table.iter().map_err(map_err!(Read))? {
                    let (key, _) = entry.map_err(map_err!(Read))?;
                    if key.value().starts_with(&prefix) {
                        keys.push(key.value().to_string());
                    }
                }
                for key in &keys {
                    table.remove(key.as_str()).map_err(map_err!(Write))?;
                }
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%tenant_id, existed, "tenant deleted");
        Ok(existed)
    }

    // ── Webhook workers ────────────────────────────────────────────

    /// Insert or update a webhook worker record.
    ///
    /// The owning tenant must exist.
    pub fn put_webhook_worker(&self, worker: &WebhookWorker) -> StateResult<()> {
        validate_id(&worker.tenant_id)?;
        validate_id(&worker.id)?;
        if self.get_tenant(&worker.tenant_id)?.is_none() {
            return Err(StateError::NotFound(format!("tenant {}", worker.tenant_id)));
        }
        let key = worker.table_key();
        self.put_json(WEBHOOK_WORKERS, &key, worker)?;
        debug!(%key, "webhook worker stored");
        Ok(())
    }

    pub fn get_webhook_worker(
        &self,
        tenant_id: &str,
        worker_id: &str,
    ) -> StateResult<Option<WebhookWorker>> {
        self.get_json(WEBHOOK_WORKERS, &worker_key(tenant_id, worker_id))
    }

    /// List a tenant's webhook workers, ordered by worker id.
    pub fn list_webhook_workers(&self, tenant_id: &str) -> StateResult<Vec<WebhookWorker>> {
        self.list_json(WEBHOOK_WORKERS, &format!("{tenant_id}/"))
    }

    /// Delete a webhook worker record. Returns true if it existed.
    pub fn delete_webhook_worker(&self, tenant_id: &str, worker_id: &str) -> StateResult<bool> {
        let key = worker_key(tenant_id, worker_id);
        let existed = self.delete_key(WEBHOOK_WORKERS, &key)?;
        self.delete_key(WORKER_STATUS, &key)?;
        debug!(%key, existed, "webhook worker deleted");
        Ok(existed)
    }

    // ── Worker status ──────────────────────────────────────────────

    /// Write the active flag for a worker.
    pub fn set_worker_active(
        &self,
        tenant_id: &str,
        worker_id: &str,
        is_active: bool,
    ) -> StateResult<WorkerStatus> {
        if self.get_webhook_worker(tenant_id, worker_id)?.is_none() {
            return Err(StateError::NotFound(worker_key(tenant_id, worker_id)));
        }
        let status = WorkerStatus {
            tenant_id: tenant_id.to_string(),
            worker_id: worker_id.to_string(),
            is_active,
            updated_at: epoch_secs(),
        };
        self.put_json(WORKER_STATUS, &status.table_key(), &status)?;
        debug!(%tenant_id, %worker_id, is_active, "worker status stored");
        Ok(status)
    }

    /// Get the last written status of a worker, if any.
    pub fn get_worker_status(
        &self,
        tenant_id: &str,
        worker_id: &str,
    ) -> StateResult<Option<WorkerStatus>> {
        self.get_json(WORKER_STATUS, &worker_key(tenant_id, worker_id))
    }

    // ── Worker registrations ───────────────────────────────────────

    /// Insert or replace the registration of a started worker.
    pub fn put_registration(&self, registration: &WorkerRegistration) -> StateResult<()> {
        validate_id(&registration.tenant_id)?;
        validate_id(&registration.worker_id)?;
        self.put_json(
            WORKER_REGISTRATIONS,
            &registration.table_key(),
            registration,
        )
    }

    pub fn get_registration(
        &self,
        tenant_id: &str,
        worker_id: &str,
    ) -> StateResult<Option<WorkerRegistration>> {
        self.get_json(WORKER_REGISTRATIONS, &worker_key(tenant_id, worker_id))
    }

    /// List registrations across all tenants.
    pub fn list_registrations(&self) -> StateResult<Vec<WorkerRegistration>> {
        self.list_json(WORKER_REGISTRATIONS, "")
    }

    /// Delete a registration. Returns true if it existed.
    pub fn delete_registration(&self, tenant_id: &str, worker_id: &str) -> StateResult<bool> {
        self.delete_key(WORKER_REGISTRATIONS, &worker_key(tenant_id, worker_id))
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn put_json<T: Serialize>(&self, def: JsonTable, key: &str, value: &T) -> StateResult<()> {
        let value = serde_json::to_vec(value).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(def).map_err(map_err!(Table))?;
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get_json<T: DeserializeOwned>(&self, def: JsonTable, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(def).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let value = serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn list_json<T: DeserializeOwned>(&self, def: JsonTable, prefix: &str) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(def).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(prefix) {
                let item = serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push(item);
            }
        }
        Ok(results)
    }

    fn delete_key(&self, def: JsonTable, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(def).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }
}

fn validate_id(id: &str) -> StateResult<()> {
    if id.is_empty() || id.contains('/') {
        return Err(StateError::InvalidId(id.to_string()));
    }
    Ok(())
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
