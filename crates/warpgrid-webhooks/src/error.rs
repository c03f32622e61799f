//! Webhook controller error types.

use thiserror::Error;

use warpgrid_health::ProbeError;

/// Errors produced by the webhook controller.
///
/// Probe, repository, startup, and release errors are isolated per worker
/// or per tenant and logged where they happen. Only tenant listing and
/// credential failures surface from a scan.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook worker {worker_id} of tenant {tenant_id} healthcheck failed: {source}")]
    Probe {
        tenant_id: String,
        worker_id: String,
        #[source]
        source: ProbeError,
    },

    #[error("repository error: {0}")]
    Repository(#[source] anyhow::Error),

    #[error("could not start webhook worker {worker_id}: {source}")]
    Startup {
        worker_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("could not generate token for tenant {tenant_id}: {source}")]
    Credential {
        tenant_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("could not cleanup {label}: {source}")]
    Release {
        label: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type WebhookResult<T> = Result<T, WebhookError>;
