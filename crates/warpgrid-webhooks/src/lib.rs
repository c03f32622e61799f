//! warpgrid-webhooks — lifecycle controller for externally hosted webhook
//! workers.
//!
//! A webhook worker is a remote HTTP endpoint that advertises a set of
//! actions and workflows. The controller discovers the workers configured
//! for every tenant, starts a worker transport for each one exactly once,
//! and supervises it with a per-worker monitor task that deactivates the
//! worker after repeated health check failures and restarts it when its
//! advertised capabilities change.
//!
//! # Architecture
//!
//! ```text
//! Controller
//!   ├── Discovery loop (every scan_interval)
//!   │   └── per tenant: issue token → list workers → run_worker()
//!   ├── RegistrationGuard (worker ids started by this controller)
//!   └── Top-level release handles (one per started worker)
//!
//! run_worker()
//!   probe → guard → WorkerTransport::start_worker → spawn WorkerMonitor
//!
//! WorkerMonitor (one task per started worker)
//!   ├── FailureTracker → mark inactive / active in WorkerRepository
//!   └── capability drift → release instance → start replacement
//! ```
//!
//! Persistence, token issuance, and the worker transport itself are
//! collaborators behind the traits in [`collab`].

pub mod cleanup;
pub mod collab;
pub mod config;
pub mod controller;
pub mod error;
pub mod monitor;
pub mod registry;
pub mod store;
pub mod token;
pub mod worker;

#[cfg(test)]
mod testing;

pub use cleanup::{CleanupChain, ReleaseHandle};
pub use collab::{CredentialIssuer, WorkerOpts, WorkerRepository, WorkerTransport, WorkerUpdate};
pub use config::ControllerConfig;
pub use controller::{Controller, ControllerDeps, ScanReport, Shutdown};
pub use error::{WebhookError, WebhookResult};
pub use registry::RegistrationGuard;
pub use store::StoreTransport;
pub use token::SigningKeyIssuer;
