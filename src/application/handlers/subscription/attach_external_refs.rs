//! AttachExternalRefsHandler - links provider identifiers after checkout creation.

use crate::application::ledger::{ensure_owner, LedgerContext};
use crate::domain::audit::Actor;
use crate::domain::foundation::{SubscriptionId, ValidationError};
use crate::domain::subscription::{ExternalRefs, LedgerError, Subscription, TransitionOutcome};

#[derive(Debug, Clone)]
pub struct AttachExternalRefsCommand {
    pub subscription_id: SubscriptionId,
    pub actor: Actor,
    pub refs: ExternalRefs,
}

#[derive(Debug, Clone)]
pub struct AttachExternalRefsResult {
    pub subscription: Subscription,
}

#[derive(Clone)]
pub struct AttachExternalRefsHandler {
    ledger: LedgerContext,
}

impl AttachExternalRefsHandler {
    pub fn new(ledger: LedgerContext) -> Self {
        Self { ledger }
    }

    pub async fn handle(
        &self,
        cmd: AttachExternalRefsCommand,
    ) -> Result<AttachExternalRefsResult, LedgerError> {
        if cmd.refs.customer.as_deref().map_or(true, str::is_empty) {
            return Err(ValidationError::empty_field("customer_ref").into());
        }

        let mutation = self
            .ledger
            .mutate(cmd.subscription_id, &cmd.actor, "attach_external_refs", |sub, _, now| {
                ensure_owner(&cmd.actor, sub)?;
                if sub.has_refs(&cmd.refs) {
                    return Ok(TransitionOutcome::NoOp);
                }
                sub.attach_external_refs(&cmd.refs, now);
                Ok(TransitionOutcome::Applied)
            })
            .await?;

        Ok(AttachExternalRefsResult {
            subscription: mutation.subscription,
        })
    }
}
