//! ReactivateSubscriptionHandler - Command handler for undoing a cancellation.

use crate::application::ledger::{ensure_owner, LedgerContext};
use crate::domain::audit::Actor;
use crate::domain::foundation::SubscriptionId;
use crate::domain::subscription::{LedgerError, Subscription, SubscriptionStatus, TransitionOutcome};

const ACTION: &str = "reactivate";

#[derive(Debug, Clone)]
pub struct ReactivateSubscriptionCommand {
    pub subscription_id: SubscriptionId,
    pub actor: Actor,
}

#[derive(Debug, Clone)]
pub struct ReactivateSubscriptionResult {
    pub subscription: Subscription,
}

#[derive(Clone)]
pub struct ReactivateSubscriptionHandler {
    ledger: LedgerContext,
}

impl ReactivateSubscriptionHandler {
    pub fn new(ledger: LedgerContext) -> Self {
        Self { ledger }
    }

    pub async fn handle(
        &self,
        cmd: ReactivateSubscriptionCommand,
    ) -> Result<ReactivateSubscriptionResult, LedgerError> {
        // 1. A canceled row cannot come back while the user owns another live one
        let current = self.ledger.load(&cmd.subscription_id).await?;
        ensure_owner(&cmd.actor, &current)?;
        if current.status == SubscriptionStatus::Canceled {
            let live = self
                .ledger
                .call(self.ledger.store().find_live_for_user(&current.user_id))
                .await?;
            if live.is_some_and(|other| other.id != current.id) {
                let err = LedgerError::already_subscribed(current.user_id.clone());
                self.ledger
                    .audit()
                    .rejected(&cmd.actor, ACTION, Some(&current), &err, self.ledger.now())
                    .await;
                return Err(err);
            }
        }

        // 2. Guarded write; the store re-checks the live-row rule
        let mutation = self
            .ledger
            .mutate(cmd.subscription_id, &cmd.actor, ACTION, |sub, catalog, now| {
                let plan = catalog.get_plan(sub.plan_id.as_str())?;
                sub.reactivate(plan, now)?;
                Ok(TransitionOutcome::Applied)
            })
            .await?;

        Ok(ReactivateSubscriptionResult {
            subscription: mutation.subscription,
        })
    }
}
