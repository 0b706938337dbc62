//! ApplyExternalTransitionHandler - internal entry point for provider events
//! and scheduled transitions.
//!
//! The reconciler and the sweeper both mutate through here, so the rules for
//! stale events, no-ops and leaving `canceled` live in one place.

use crate::application::ledger::{LedgerContext, Mutation};
use crate::domain::audit::Actor;
use crate::domain::foundation::SubscriptionId;
use crate::domain::subscription::{LedgerError, TransitionEffect, TransitionKind};

#[derive(Debug, Clone)]
pub struct ApplyExternalTransitionCommand {
    pub subscription_id: SubscriptionId,
    pub actor: Actor,
    pub kind: TransitionKind,
    pub effect: TransitionEffect,
}

#[derive(Clone)]
pub struct ApplyExternalTransitionHandler {
    ledger: LedgerContext,
}

impl ApplyExternalTransitionHandler {
    pub fn new(ledger: LedgerContext) -> Self {
        Self { ledger }
    }

    pub async fn handle(&self, cmd: ApplyExternalTransitionCommand) -> Result<Mutation, LedgerError> {
        self.ledger
            .mutate(
                cmd.subscription_id,
                &cmd.actor,
                cmd.kind.as_str(),
                |sub, catalog, now| {
                    let plan = catalog.get_plan(sub.plan_id.as_str())?;
                    sub.apply_external(cmd.kind, &cmd.effect, plan, now)
                },
            )
            .await
    }
}
