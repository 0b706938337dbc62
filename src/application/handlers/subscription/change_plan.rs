//! ChangePlanHandler - Command handler for upgrades and downgrades.

use crate::application::ledger::{ensure_owner, LedgerContext};
use crate::domain::audit::Actor;
use crate::domain::foundation::SubscriptionId;
use crate::domain::subscription::{
    LedgerError, PlanChangeDirection, Subscription, SubscriptionStatus, TransitionOutcome,
};

/// Command to move a subscription to another plan.
#[derive(Debug, Clone)]
pub struct ChangePlanCommand {
    pub subscription_id: SubscriptionId,
    pub actor: Actor,
    pub new_plan_id: String,
    /// Must agree with the catalog's price comparison.
    pub direction: PlanChangeDirection,
}

#[derive(Debug, Clone)]
pub struct ChangePlanResult {
    pub subscription: Subscription,
}

#[derive(Clone)]
pub struct ChangePlanHandler {
    ledger: LedgerContext,
}

impl ChangePlanHandler {
    pub fn new(ledger: LedgerContext) -> Self {
        Self { ledger }
    }

    pub async fn handle(&self, cmd: ChangePlanCommand) -> Result<ChangePlanResult, LedgerError> {
        // 1. Unknown target plan fails before touching the store
        self.ledger.catalog().get_plan(&cmd.new_plan_id)?;

        // 2. Guarded read-modify-write
        let mutation = self
            .ledger
            .mutate(cmd.subscription_id, &cmd.actor, "change_plan", |sub, catalog, now| {
                ensure_owner(&cmd.actor, sub)?;
                if sub.status == SubscriptionStatus::Canceled {
                    return Err(LedgerError::invalid_transition(sub.status, "change plan of"));
                }

                let new_plan = catalog.get_plan(&cmd.new_plan_id)?;
                let comparison = catalog.compare(&cmd.new_plan_id, sub.plan_id.as_str())?;
                cmd.direction
                    .validate(comparison, &sub.plan_id, &new_plan.id)?;

                sub.change_plan(new_plan, now)?;
                Ok(TransitionOutcome::Applied)
            })
            .await?;

        Ok(ChangePlanResult {
            subscription: mutation.subscription,
        })
    }
}
