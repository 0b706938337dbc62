//! Audit Recorder - appends one immutable record per attempted mutation.
//!
//! Records are written after the mutation they describe has committed.
//! A failed append is logged at `error` level and does not undo or fail the
//! mutation; the row itself is already the source of truth by then.

use std::fmt::Display;
use std::sync::Arc;

use tracing::error;

use crate::domain::audit::{Actor, AuditRecord};
use crate::domain::foundation::{DomainError, SubscriptionId, Timestamp};
use crate::domain::subscription::Subscription;
use crate::ports::AuditLog;

#[derive(Clone)]
pub struct AuditRecorder {
    log: Arc<dyn AuditLog>,
}

impl AuditRecorder {
    pub fn new(log: Arc<dyn AuditLog>) -> Self {
        Self { log }
    }

    pub async fn record(&self, record: AuditRecord) {
        if let Err(e) = self.log.append(&record).await {
            error!(
                action = %record.action,
                subscription_id = ?record.target_subscription_id,
                error = %e,
                "failed to append audit record"
            );
        }
    }

    pub async fn applied(
        &self,
        actor: &Actor,
        action: &str,
        before: Option<&Subscription>,
        after: &Subscription,
        at: Timestamp,
    ) {
        self.record(AuditRecord::applied(actor.clone(), action, before, after, at))
            .await;
    }

    pub async fn rejected(
        &self,
        actor: &Actor,
        action: &str,
        target: Option<&Subscription>,
        reason: &(dyn Display + Sync),
        at: Timestamp,
    ) {
        let record = AuditRecord::rejected(actor.clone(), action, target, reason.to_string(), at);
        self.record(record).await;
    }

    /// Every record for a subscription, oldest first.
    pub async fn trail(&self, id: &SubscriptionId) -> Result<Vec<AuditRecord>, DomainError> {
        self.log.for_subscription(id).await
    }
}
