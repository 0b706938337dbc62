//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the core and the outside world. Adapters implement these ports.
//!
//! ## Storage Ports
//!
//! - `SubscriptionStore` - subscription rows with version-guarded updates
//! - `ProcessedEventStore` - provider event deduplication log
//! - `AuditLog` - append-only mutation trail
//!
//! ## Collaborator Ports
//!
//! - `Notifier` - outbound user notifications
//! - `Clock` - current time

mod audit_log;
mod clock;
mod notifier;
mod processed_event_store;
mod subscription_store;

pub use audit_log::AuditLog;
pub use clock::Clock;
pub use notifier::{Notification, Notifier};
pub use processed_event_store::{ClaimResult, EventOutcome, ProcessedEvent, ProcessedEventStore};
pub use subscription_store::{
    InsertResult, ScanCursor, SubscriptionCounts, SubscriptionFilter, SubscriptionPage,
    SubscriptionStore, UpdateResult,
};
