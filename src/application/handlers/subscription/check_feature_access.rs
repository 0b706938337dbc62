//! CheckFeatureAccessHandler - does a user's current plan include a feature.

use crate::application::ledger::LedgerContext;
use crate::domain::catalog::PlanId;
use crate::domain::foundation::UserId;
use crate::domain::subscription::LedgerError;

#[derive(Debug, Clone)]
pub struct CheckFeatureAccessQuery {
    pub user_id: UserId,
    pub feature: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureAccess {
    pub allowed: bool,
    /// Plan of the live subscription, if any.
    pub plan_id: Option<PlanId>,
}

#[derive(Clone)]
pub struct CheckFeatureAccessHandler {
    ledger: LedgerContext,
}

impl CheckFeatureAccessHandler {
    pub fn new(ledger: LedgerContext) -> Self {
        Self { ledger }
    }

    pub async fn handle(&self, query: CheckFeatureAccessQuery) -> Result<FeatureAccess, LedgerError> {
        let live = self
            .ledger
            .call(self.ledger.store().find_live_for_user(&query.user_id))
            .await?;

        Ok(match live {
            Some(sub) => FeatureAccess {
                allowed: sub.status.grants_access()
                    && self
                        .ledger
                        .catalog()
                        .has_feature(sub.plan_id.as_str(), &query.feature),
                plan_id: Some(sub.plan_id),
            },
            None => FeatureAccess {
                allowed: false,
                plan_id: None,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{t0, user, Harness};
    use crate::domain::subscription::{TransitionEffect, TransitionKind};
    use crate::ports::SubscriptionStore;

    fn query(user_id: &str, feature: &str) -> CheckFeatureAccessQuery {
        CheckFeatureAccessQuery {
            user_id: user(user_id),
            feature: feature.to_string(),
        }
    }

    #[tokio::test]
    async fn plan_feature_is_granted_while_live() {
        let h = Harness::new();
        h.seed("7", "pro", 14).await;
        let handler = CheckFeatureAccessHandler::new(h.ctx.clone());

        assert!(handler.handle(query("7", "api_access")).await.unwrap().allowed);
        assert!(!handler.handle(query("7", "teleport")).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn past_due_still_grants_access() {
        let h = Harness::new();
        let mut sub = h.seed("7", "pro", 0).await;
        let plan = h.ctx.catalog().get_plan("pro").unwrap().clone();
        sub.apply_external(
            TransitionKind::MarkPastDue,
            &TransitionEffect::at(t0().add_secs(1)),
            &plan,
            t0(),
        )
        .unwrap();
        h.store.update(&sub, 0).await.unwrap();
        let handler = CheckFeatureAccessHandler::new(h.ctx.clone());

        assert!(handler.handle(query("7", "api_access")).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn no_live_subscription_means_no_access() {
        let h = Harness::new();
        let mut sub = h.seed("7", "pro", 0).await;
        sub.cancel_immediately(t0()).unwrap();
        h.store.update(&sub, 0).await.unwrap();
        let handler = CheckFeatureAccessHandler::new(h.ctx.clone());

        let access = handler.handle(query("7", "api_access")).await.unwrap();

        assert!(!access.allowed);
        assert!(access.plan_id.is_none());
    }
}
