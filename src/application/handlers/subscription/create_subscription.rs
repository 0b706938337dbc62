//! CreateSubscriptionHandler - Command handler for starting a subscription.

use tracing::{info, warn};

use crate::application::ledger::LedgerContext;
use crate::domain::audit::Actor;
use crate::domain::foundation::{SubscriptionId, Timestamp, UserId};
use crate::domain::subscription::{LedgerError, Subscription};
use crate::ports::InsertResult;

const ACTION: &str = "create";

/// Command to start a subscription for a user.
#[derive(Debug, Clone)]
pub struct CreateSubscriptionCommand {
    pub user_id: UserId,
    pub plan_id: String,
    /// `None` or `Some(0)` starts active without a trial.
    pub trial_days: Option<u32>,
}

/// Result of successful creation.
#[derive(Debug, Clone)]
pub struct CreateSubscriptionResult {
    pub subscription: Subscription,
}

/// Handler for creating subscriptions.
#[derive(Clone)]
pub struct CreateSubscriptionHandler {
    ledger: LedgerContext,
}

impl CreateSubscriptionHandler {
    pub fn new(ledger: LedgerContext) -> Self {
        Self { ledger }
    }

    pub async fn handle(
        &self,
        cmd: CreateSubscriptionCommand,
    ) -> Result<CreateSubscriptionResult, LedgerError> {
        let actor = Actor::User(cmd.user_id.clone());
        let now = self.ledger.now();

        // 1. Resolve the plan
        let plan = self.ledger.catalog().get_plan(&cmd.plan_id)?;

        // 2. Cheap pre-check; the insert below is the real guard
        if self
            .ledger
            .call(self.ledger.store().find_live_for_user(&cmd.user_id))
            .await?
            .is_some()
        {
            return Err(self.reject(&actor, cmd.user_id, now).await);
        }

        // 3. Build the aggregate
        let subscription = Subscription::create(
            SubscriptionId::new(),
            cmd.user_id.clone(),
            plan,
            cmd.trial_days.unwrap_or(0),
            now,
        )?;

        // 4. Insert, losing gracefully to a concurrent create
        match self
            .ledger
            .call(self.ledger.store().insert(&subscription))
            .await?
        {
            InsertResult::Inserted => {}
            InsertResult::LiveSubscriptionExists => {
                return Err(self.reject(&actor, cmd.user_id, now).await);
            }
        }

        // 5. Audit
        self.ledger
            .audit()
            .applied(&actor, ACTION, None, &subscription, now)
            .await;

        info!(
            subscription_id = %subscription.id,
            user_id = %subscription.user_id,
            plan_id = %subscription.plan_id,
            status = %subscription.status,
            "subscription created"
        );

        Ok(CreateSubscriptionResult { subscription })
    }

    async fn reject(&self, actor: &Actor, user_id: UserId, now: Timestamp) -> LedgerError {
        let err = LedgerError::already_subscribed(user_id);
        warn!(actor = %actor, reason = %err, "subscription create rejected");
        self.ledger.audit().rejected(actor, ACTION, None, &err, now).await;
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{t0, user, Harness};
    use crate::domain::subscription::SubscriptionStatus;
    use crate::ports::SubscriptionStore;
    use std::sync::Arc;

    fn command(user_id: &str, plan: &str, trial_days: Option<u32>) -> CreateSubscriptionCommand {
        CreateSubscriptionCommand {
            user_id: user(user_id),
            plan_id: plan.to_string(),
            trial_days,
        }
    }

    #[tokio::test]
    async fn creates_trialing_subscription() {
        let h = Harness::new();
        let handler = CreateSubscriptionHandler::new(h.ctx.clone());

        let result = handler.handle(command("7", "premium", Some(14))).await.unwrap();

        let sub = result.subscription;
        assert_eq!(sub.status, SubscriptionStatus::Trialing);
        assert!(sub.is_trialing);
        assert_eq!(sub.trial_end, Some(t0().add_days(14)));
        assert_eq!(h.stored(&sub.id).await, sub);
    }

    #[tokio::test]
    async fn creates_active_subscription_without_trial() {
        let h = Harness::new();
        let handler = CreateSubscriptionHandler::new(h.ctx.clone());

        let sub = handler
            .handle(command("7", "premium_annual", None))
            .await
            .unwrap()
            .subscription;

        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.current_period_end, t0().add_months(12));
    }

    #[tokio::test]
    async fn records_audit_entry_without_before_state() {
        let h = Harness::new();
        let handler = CreateSubscriptionHandler::new(h.ctx.clone());

        handler.handle(command("7", "premium", None)).await.unwrap();

        let records = h.audit.all().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, "create");
        assert!(records[0].success);
        assert!(records[0].before_state.is_none());
        assert!(records[0].after_state.is_some());
    }

    #[tokio::test]
    async fn second_create_is_already_subscribed_and_writes_no_row() {
        let h = Harness::new();
        let handler = CreateSubscriptionHandler::new(h.ctx.clone());
        handler.handle(command("7", "premium", None)).await.unwrap();

        let result = handler.handle(command("7", "pro", None)).await;

        assert!(matches!(result, Err(LedgerError::AlreadySubscribed { .. })));
        assert_eq!(h.store.len().await, 1);
        let records = h.audit.all().await;
        assert_eq!(records.len(), 2);
        assert!(!records[1].success);
    }

    #[tokio::test]
    async fn canceled_history_does_not_block_new_subscription() {
        let h = Harness::new();
        let mut old = h.seed("7", "premium", 0).await;
        let expected = old.version;
        old.cancel_immediately(t0()).unwrap();
        h.store.update(&old, expected).await.unwrap();
        let handler = CreateSubscriptionHandler::new(h.ctx.clone());

        let result = handler.handle(command("7", "pro", None)).await;

        assert!(result.is_ok());
        assert_eq!(h.store.len().await, 2);
    }

    #[tokio::test]
    async fn unknown_plan_is_validation_error() {
        let h = Harness::new();
        let handler = CreateSubscriptionHandler::new(h.ctx.clone());

        let result = handler.handle(command("7", "platinum", None)).await;

        assert!(matches!(result, Err(LedgerError::Validation(_))));
        assert!(h.store.is_empty().await);
        assert!(h.audit.all().await.is_empty());
    }

    #[tokio::test]
    async fn excessive_trial_is_validation_error() {
        let h = Harness::new();
        let handler = CreateSubscriptionHandler::new(h.ctx.clone());

        let result = handler.handle(command("7", "premium", Some(400))).await;

        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[tokio::test]
    async fn concurrent_creates_leave_exactly_one_live_row() {
        let h = Harness::new();
        let handler = Arc::new(CreateSubscriptionHandler::new(h.ctx.clone()));

        let attempts = (0..8).map(|_| {
            let handler = handler.clone();
            tokio::spawn(async move { handler.handle(command("7", "premium", None)).await })
        });
        let results = futures::future::join_all(attempts).await;

        let created = results
            .into_iter()
            .filter(|r| matches!(r, Ok(Ok(_))))
            .count();
        assert_eq!(created, 1);
        assert!(h.store.find_live_for_user(&user("7")).await.unwrap().is_some());
        assert_eq!(h.store.len().await, 1);
    }
}
