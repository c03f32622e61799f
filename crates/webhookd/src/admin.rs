//! Record administration: tenants and webhook worker records.
//!
//! Output goes to stdout as JSON lines so it can be piped into `jq`.

use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context};
use tracing::info;

use warpgrid_state::{StateStore, WebhookWorker};

pub fn add_tenant(store: &StateStore, tenant_id: &str) -> anyhow::Result<()> {
    let tenant = store.put_tenant(tenant_id)?;
    info!(tenant_id = %tenant.id, "tenant added");
    Ok(())
}

pub fn list_tenants(store: &StateStore, out: &mut impl Write) -> anyhow::Result<()> {
    for tenant in store.list_tenants()? {
        writeln!(out, "{}", serde_json::to_string(&tenant)?)?;
    }
    Ok(())
}

/// Delete a tenant with every worker record, status and registration
/// stored under it.
pub fn remove_tenant(store: &StateStore, tenant_id: &str) -> anyhow::Result<()> {
    if !store.delete_tenant(tenant_id)? {
        bail!("tenant {tenant_id} not found");
    }
    info!(%tenant_id, "tenant removed");
    Ok(())
}

/// Create or update a webhook worker record, keeping its creation time.
pub fn add_worker(
    store: &StateStore,
    tenant_id: &str,
    worker_id: &str,
    url: &str,
    secret: &str,
) -> anyhow::Result<()> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("worker url must be http:// or https://: {url}");
    }
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let created_at = store
        .get_webhook_worker(tenant_id, worker_id)?
        .map_or(now, |existing| existing.created_at);

    let worker = WebhookWorker {
        id: worker_id.to_string(),
        tenant_id: tenant_id.to_string(),
        url: url.to_string(),
        secret: secret.to_string(),
        created_at,
        updated_at: now,
    };
    store
        .put_webhook_worker(&worker)
        .with_context(|| format!("storing webhook worker {worker_id}"))?;
    info!(%tenant_id, %worker_id, %url, "webhook worker stored");
    Ok(())
}

/// Print a tenant's workers with their last written active flag.
/// Secrets are never printed.
pub fn list_workers(store: &StateStore, tenant_id: &str, out: &mut impl Write) -> anyhow::Result<()> {
    for worker in store.list_webhook_workers(tenant_id)? {
        let status = store.get_worker_status(tenant_id, &worker.id)?;
        let line = serde_json::json!({
            "id": worker.id,
            "tenant_id": worker.tenant_id,
            "url": worker.url,
            "is_active": status.map(|s| s.is_active),
            "updated_at": worker.updated_at,
        });
        writeln!(out, "{line}")?;
    }
    Ok(())
}

pub fn remove_worker(store: &StateStore, tenant_id: &str, worker_id: &str) -> anyhow::Result<()> {
    if !store.delete_webhook_worker(tenant_id, worker_id)? {
        bail!("webhook worker {worker_id} of tenant {tenant_id} not found");
    }
    info!(%tenant_id, %worker_id, "webhook worker removed");
    Ok(())
}
