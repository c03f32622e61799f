//! warpgrid-health — health checking for webhook workers.
//!
//! Provides the HTTP health probe that fetches a worker's capability
//! manifest, the order-independent fingerprint used to detect capability
//! drift, and the consecutive-failure tracker that decides when a worker
//! is deactivated or recovered.
//!
//! # Architecture
//!
//! ```text
//! HealthProbe (trait)
//!   └── HttpProbe: GET <http(s) url> → 200 + {"actions": [..], "workflows": [..]}
//!
//! CapabilityManifest
//!   └── fingerprint() → ManifestFingerprint { actions, workflows }
//!
//! FailureTracker
//!   Active → Degraded(1..=threshold) → Inactive
//!   any success → Active (Recovered transition if failures were seen)
//! ```
//!
//! The probe never retries. Retrying is the job of whoever drives the
//! tracker, usually a per-worker monitor task.

pub mod checker;
pub mod manifest;
pub mod tracker;

pub use checker::{BoxFuture, HealthProbe, HttpProbe, ProbeError, ProbeErrorKind, ProbeResult};
pub use manifest::{fingerprint, CapabilityManifest, ManifestFingerprint};
pub use tracker::{FailureTracker, Transition, WorkerHealth, DEFAULT_FAILURE_THRESHOLD};
