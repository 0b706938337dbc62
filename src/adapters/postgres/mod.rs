//! PostgreSQL adapters - Database implementations for storage ports.
//!
//! - `PostgresSubscriptionStore` - subscription rows, version-guarded updates
//! - `PostgresProcessedEventStore` - provider event deduplication log
//! - `PostgresAuditLog` - append-only mutation trail
//!
//! Schema lives in `migrations/` and is applied with `sqlx::migrate!`.

mod audit_log;
mod processed_event_store;
mod subscription_store;

pub use audit_log::PostgresAuditLog;
pub use processed_event_store::PostgresProcessedEventStore;
pub use subscription_store::PostgresSubscriptionStore;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Wraps a driver error; pool timeouts are reported as `Timeout`.
fn db_error(context: &str, e: sqlx::Error) -> DomainError {
    let code = match &e {
        sqlx::Error::PoolTimedOut => ErrorCode::Timeout,
        _ => ErrorCode::DatabaseError,
    };
    DomainError::new(code, format!("{}: {}", context, e))
}

fn is_constraint(e: &sqlx::Error, name: &str) -> bool {
    match e {
        sqlx::Error::Database(db_err) => db_err.constraint() == Some(name),
        _ => false,
    }
}
