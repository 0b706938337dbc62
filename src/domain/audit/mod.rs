//! Append-only audit trail domain.

mod record;

pub use record::{Actor, AuditRecord};
