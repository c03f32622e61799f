//! redb table definitions for the webhook state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).

use redb::TableDefinition;

/// Shape shared by every table in the store.
pub type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Tenants keyed by `{tenant_id}`.
pub const TENANTS: JsonTable = TableDefinition::new("tenants");

/// Webhook worker records keyed by `{tenant_id}/{worker_id}`.
pub const WEBHOOK_WORKERS: JsonTable = TableDefinition::new("webhook_workers");

/// Active/inactive status keyed by `{tenant_id}/{worker_id}`.
pub const WORKER_STATUS: JsonTable = TableDefinition::new("worker_status");

/// Capability sets of started workers keyed by `{tenant_id}/{worker_id}`.
pub const WORKER_REGISTRATIONS: JsonTable = TableDefinition::new("worker_registrations");
