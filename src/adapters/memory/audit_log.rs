//! In-memory implementation of AuditLog.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::audit::AuditRecord;
use crate::domain::foundation::{DomainError, SubscriptionId};
use crate::ports::AuditLog;

/// Append-only vector of records, in insertion order.
#[derive(Default)]
pub struct InMemoryAuditLog {
    records: RwLock<Vec<AuditRecord>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record, oldest first.
    pub async fn all(&self) -> Vec<AuditRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn append(&self, record: &AuditRecord) -> Result<(), DomainError> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn for_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<AuditRecord>, DomainError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.target_subscription_id.as_ref() == Some(subscription_id))
            .cloned()
            .collect())
    }
}
