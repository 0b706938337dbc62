//! GetAuditTrailHandler - Query handler for a subscription's audit records.

use crate::application::ledger::LedgerContext;
use crate::domain::audit::AuditRecord;
use crate::domain::foundation::SubscriptionId;
use crate::domain::subscription::LedgerError;

#[derive(Debug, Clone)]
pub struct GetAuditTrailQuery {
    pub subscription_id: SubscriptionId,
}

#[derive(Clone)]
pub struct GetAuditTrailHandler {
    ledger: LedgerContext,
}

impl GetAuditTrailHandler {
    pub fn new(ledger: LedgerContext) -> Self {
        Self { ledger }
    }

    /// Records oldest first; an unknown id yields an empty trail.
    pub async fn handle(&self, query: GetAuditTrailQuery) -> Result<Vec<AuditRecord>, LedgerError> {
        self.ledger
            .call(self.ledger.audit().trail(&query.subscription_id))
            .await
    }
}
