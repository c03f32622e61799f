//! warpgrid-state — embedded state store for WarpGrid webhook workers.
//!
//! Backed by [redb](https://docs.rs/redb), persists tenants, the webhook
//! worker records configured under them, the active/inactive status the
//! webhook controller writes, and the capability sets of currently
//! started workers.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Worker-scoped tables use `{tenant_id}/{worker_id}` keys so a tenant's
//! records can be found with a prefix scan.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
