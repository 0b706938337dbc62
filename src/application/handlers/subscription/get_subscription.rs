//! GetSubscriptionHandler - Query handler for a single subscription.

use crate::application::ledger::LedgerContext;
use crate::domain::catalog::Plan;
use crate::domain::foundation::{SubscriptionId, UserId};
use crate::domain::subscription::{LedgerError, Subscription};

#[derive(Debug, Clone)]
pub enum GetSubscriptionQuery {
    ById(SubscriptionId),
    /// The user's live row, or their most recent one when all are canceled.
    ForUser(UserId),
}

#[derive(Debug, Clone)]
pub struct GetSubscriptionResult {
    pub subscription: Subscription,
    /// `None` if the row references a plan no longer in the catalog.
    pub plan: Option<Plan>,
}

#[derive(Clone)]
pub struct GetSubscriptionHandler {
    ledger: LedgerContext,
}

impl GetSubscriptionHandler {
    pub fn new(ledger: LedgerContext) -> Self {
        Self { ledger }
    }

    pub async fn handle(&self, query: GetSubscriptionQuery) -> Result<GetSubscriptionResult, LedgerError> {
        let store = self.ledger.store();
        let subscription = match &query {
            GetSubscriptionQuery::ById(id) => self.ledger.load(id).await?,
            GetSubscriptionQuery::ForUser(user_id) => {
                let live = self.ledger.call(store.find_live_for_user(user_id)).await?;
                let found = match live {
                    Some(sub) => Some(sub),
                    None => self.ledger.call(store.find_latest_for_user(user_id)).await?,
                };
                found.ok_or_else(|| LedgerError::not_found(format!("user {}", user_id)))?
            }
        };

        let plan = self
            .ledger
            .catalog()
            .get_plan(subscription.plan_id.as_str())
            .ok()
            .cloned();

        Ok(GetSubscriptionResult { subscription, plan })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{t0, user, Harness};
    use crate::ports::SubscriptionStore;

    #[tokio::test]
    async fn for_user_prefers_live_row() {
        let h = Harness::new();
        let mut old = h.seed("7", "premium", 0).await;
        old.cancel_immediately(t0()).unwrap();
        h.store.update(&old, 0).await.unwrap();
        h.clock.advance_days(1);
        let live = h.seed("7", "pro", 0).await;
        let handler = GetSubscriptionHandler::new(h.ctx.clone());

        let result = handler
            .handle(GetSubscriptionQuery::ForUser(user("7")))
            .await
            .unwrap();

        assert_eq!(result.subscription.id, live.id);
        assert_eq!(result.plan.unwrap().price_minor_units, 1999);
    }

    #[tokio::test]
    async fn for_user_falls_back_to_latest_canceled_row() {
        let h = Harness::new();
        let mut old = h.seed("7", "premium", 0).await;
        old.cancel_immediately(t0()).unwrap();
        h.store.update(&old, 0).await.unwrap();
        let handler = GetSubscriptionHandler::new(h.ctx.clone());

        let result = handler
            .handle(GetSubscriptionQuery::ForUser(user("7")))
            .await
            .unwrap();

        assert_eq!(result.subscription.id, old.id);
    }

    #[tokio::test]
    async fn unknown_user_and_id_are_not_found() {
        let h = Harness::new();
        let handler = GetSubscriptionHandler::new(h.ctx.clone());

        assert!(matches!(
            handler.handle(GetSubscriptionQuery::ForUser(user("9"))).await,
            Err(LedgerError::NotFound(_))
        ));
        assert!(matches!(
            handler.handle(GetSubscriptionQuery::ById(SubscriptionId::new())).await,
            Err(LedgerError::NotFound(_))
        ));
    }
}
