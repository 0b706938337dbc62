//! CancelSubscriptionHandler - Command handler for user cancellation.
//!
//! `immediate = false` only flags the row; the sweeper ends it once the
//! current period is over.

use crate::application::ledger::{ensure_owner, LedgerContext};
use crate::domain::audit::Actor;
use crate::domain::foundation::SubscriptionId;
use crate::domain::subscription::{LedgerError, Subscription, TransitionOutcome};

#[derive(Debug, Clone)]
pub struct CancelSubscriptionCommand {
    pub subscription_id: SubscriptionId,
    pub actor: Actor,
    pub immediate: bool,
}

#[derive(Debug, Clone)]
pub struct CancelSubscriptionResult {
    pub subscription: Subscription,
}

#[derive(Clone)]
pub struct CancelSubscriptionHandler {
    ledger: LedgerContext,
}

impl CancelSubscriptionHandler {
    pub fn new(ledger: LedgerContext) -> Self {
        Self { ledger }
    }

    pub async fn handle(
        &self,
        cmd: CancelSubscriptionCommand,
    ) -> Result<CancelSubscriptionResult, LedgerError> {
        let action = if cmd.immediate {
            "cancel_immediately"
        } else {
            "schedule_cancel"
        };

        let mutation = self
            .ledger
            .mutate(cmd.subscription_id, &cmd.actor, action, |sub, _, now| {
                ensure_owner(&cmd.actor, sub)?;
                if cmd.immediate {
                    sub.cancel_immediately(now)?;
                } else if sub.cancel_at_period_end {
                    return Ok(TransitionOutcome::NoOp);
                } else {
                    sub.schedule_cancellation(now)?;
                }
                Ok(TransitionOutcome::Applied)
            })
            .await?;

        Ok(CancelSubscriptionResult {
            subscription: mutation.subscription,
        })
    }
}
