//! AdminOverrideHandler - Command handler for operator changes to any subscription.
//!
//! Admins skip the ownership check and the upgrade/downgrade direction rule,
//! but every other lifecycle rule still holds. The stated reason is stored
//! on each audit record the override produces.

use crate::application::ledger::LedgerContext;
use crate::domain::audit::{Actor, AuditRecord};
use crate::domain::foundation::{SubscriptionId, UserId, ValidationError};
use crate::domain::subscription::{LedgerError, Subscription, SubscriptionStatus, TransitionOutcome};

/// What the operator wants done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminAction {
    Cancel { immediate: bool },
    Reactivate,
    ChangePlan { plan_id: String },
}

impl AdminAction {
    fn audit_action(&self) -> &'static str {
        match self {
            AdminAction::Cancel { immediate: true } => "admin_cancel_immediately",
            AdminAction::Cancel { immediate: false } => "admin_schedule_cancel",
            AdminAction::Reactivate => "admin_reactivate",
            AdminAction::ChangePlan { .. } => "admin_change_plan",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdminOverrideCommand {
    pub subscription_id: SubscriptionId,
    pub admin: UserId,
    pub action: AdminAction,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct AdminOverrideResult {
    pub subscription: Subscription,
    pub outcome: TransitionOutcome,
}

#[derive(Clone)]
pub struct AdminOverrideHandler {
    ledger: LedgerContext,
}

impl AdminOverrideHandler {
    pub fn new(ledger: LedgerContext) -> Self {
        Self { ledger }
    }

    pub async fn handle(&self, cmd: AdminOverrideCommand) -> Result<AdminOverrideResult, LedgerError> {
        let reason = cmd.reason.trim();
        if reason.is_empty() {
            return Err(ValidationError::empty_field("reason").into());
        }
        if let AdminAction::ChangePlan { plan_id } = &cmd.action {
            self.ledger.catalog().get_plan(plan_id)?;
        }

        let actor = Actor::Admin(cmd.admin.clone());
        let action = cmd.action.audit_action();

        if cmd.action == AdminAction::Reactivate {
            self.ensure_no_other_live_row(&cmd.subscription_id, &actor, action, reason)
                .await?;
        }

        let mutation = self
            .ledger
            .mutate_with_reason(cmd.subscription_id, &actor, action, Some(reason), |sub, catalog, now| {
                match &cmd.action {
                    AdminAction::Cancel { immediate: true } => sub.cancel_immediately(now)?,
                    AdminAction::Cancel { immediate: false } => {
                        if sub.cancel_at_period_end {
                            return Ok(TransitionOutcome::NoOp);
                        }
                        sub.schedule_cancellation(now)?;
                    }
                    AdminAction::Reactivate => {
                        let plan = catalog.get_plan(sub.plan_id.as_str())?;
                        sub.reactivate(plan, now)?;
                    }
                    AdminAction::ChangePlan { plan_id } => {
                        if sub.status == SubscriptionStatus::Canceled {
                            return Err(LedgerError::invalid_transition(sub.status, "change plan of"));
                        }
                        if sub.plan_id.as_str() == plan_id {
                            return Ok(TransitionOutcome::NoOp);
                        }
                        sub.change_plan(catalog.get_plan(plan_id)?, now)?;
                    }
                }
                Ok(TransitionOutcome::Applied)
            })
            .await?;

        Ok(AdminOverrideResult {
            subscription: mutation.subscription,
            outcome: mutation.outcome,
        })
    }

    /// A canceled row cannot come back while its user owns another live one.
    async fn ensure_no_other_live_row(
        &self,
        id: &SubscriptionId,
        actor: &Actor,
        action: &str,
        reason: &str,
    ) -> Result<(), LedgerError> {
        let current = self.ledger.load(id).await?;
        if current.status != SubscriptionStatus::Canceled {
            return Ok(());
        }
        let live = self
            .ledger
            .call(self.ledger.store().find_live_for_user(&current.user_id))
            .await?;
        if live.is_some_and(|other| other.id != current.id) {
            let err = LedgerError::already_subscribed(current.user_id.clone());
            let record = AuditRecord::rejected(
                actor.clone(),
                action,
                Some(&current),
                err.to_string(),
                self.ledger.now(),
            )
            .with_reason(Some(reason));
            self.ledger.audit().record(record).await;
            return Err(err);
        }
        Ok(())
    }
}
