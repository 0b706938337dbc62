//! AuditLog port - append-only trail of subscription mutations.

use async_trait::async_trait;

use crate::domain::audit::AuditRecord;
use crate::domain::foundation::{DomainError, SubscriptionId};

#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Appends a record. Records are never updated or deleted.
    async fn append(&self, record: &AuditRecord) -> Result<(), DomainError>;

    /// All records for a subscription, oldest first.
    async fn for_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<AuditRecord>, DomainError>;
}
