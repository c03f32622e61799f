//! Registration guard that makes worker startup idempotent.
//!
//! The discovery loop sees every configured worker on every scan. The
//! guard remembers which worker ids this controller has already started
//! so a re-discovered worker is not started twice. Ids stay registered
//! across restarts and are only dropped when the controller shuts down.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

/// Set of worker ids started by this controller instance.
#[derive(Debug, Default)]
pub struct RegistrationGuard {
    registered: Mutex<HashSet<String>>,
}

impl RegistrationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically insert `worker_id` if absent.
    ///
    /// Returns `true` if this call inserted it and the caller should start
    /// the worker, `false` if it was already registered.
    pub fn try_register(&self, worker_id: &str) -> bool {
        let inserted = self.lock().insert(worker_id.to_string());
        if !inserted {
            debug!(%worker_id, "webhook worker already registered");
        }
        inserted
    }

    /// Registered worker ids, sorted.
    pub fn registered(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().iter().cloned().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Forget every registration. Called on controller shutdown.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // The set stays consistent even if a holder panicked.
        self.registered.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
