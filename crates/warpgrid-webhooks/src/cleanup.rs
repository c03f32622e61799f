//! Release handles and ordered cleanup chains.
//!
//! Every resource the controller acquires (a started transport, a worker
//! slot with its monitor) is paired with one `ReleaseHandle`. Handles are
//! consumed by value, so each one runs at most once.

use std::fmt;
use std::future::Future;

use tracing::{debug, warn};

use warpgrid_health::BoxFuture;

use crate::error::{WebhookError, WebhookResult};

type ReleaseFn = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// A one-shot async release action.
pub struct ReleaseHandle {
    label: String,
    release: ReleaseFn,
}

impl ReleaseHandle {
    pub fn new<F, Fut>(label: impl Into<String>, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            label: label.into(),
            release: Box::new(move || -> BoxFuture<'static, anyhow::Result<()>> { Box::pin(f()) }),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Run the release action.
    pub async fn release(self) -> WebhookResult<()> {
        debug!(label = %self.label, "releasing");
        (self.release)().await.map_err(|source| WebhookError::Release {
            label: self.label,
            source,
        })
    }
}

impl fmt::Debug for ReleaseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseHandle")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Ordered release actions, run front to back.
#[derive(Debug, Default)]
pub struct CleanupChain {
    handles: Vec<ReleaseHandle>,
}

impl CleanupChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handle: ReleaseHandle) {
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Run every handle in order and collect the failures.
    ///
    /// A failing handle does not stop the ones after it.
    pub async fn run_all(self) -> Vec<WebhookError> {
        let mut errors = Vec::new();
        for handle in self.handles {
            if let Err(e) = handle.release().await {
                warn!(error = %e, "release failed");
                errors.push(e);
            }
        }
        errors
    }

    /// Run every handle in order and return the first failure, if any.
    pub async fn run(self) -> WebhookResult<()> {
        match self.run_all().await.into_iter().next() {
            Some(first) => Err(first),
            None => Ok(()),
        }
    }
}

impl From<Vec<ReleaseHandle>> for CleanupChain {
    fn from(handles: Vec<ReleaseHandle>) -> Self {
        Self { handles }
    }
}
