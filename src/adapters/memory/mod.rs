//! In-memory adapters for tests and local runs.

mod audit_log;
mod processed_event_store;
mod subscription_store;

pub use audit_log::InMemoryAuditLog;
pub use processed_event_store::InMemoryProcessedEventStore;
pub use subscription_store::InMemorySubscriptionStore;
