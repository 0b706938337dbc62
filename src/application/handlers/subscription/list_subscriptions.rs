//! ListSubscriptionsHandler - Query handler for the admin listing.

use crate::application::ledger::LedgerContext;
use crate::domain::subscription::{LedgerError, Subscription, SubscriptionStatus};
use crate::ports::SubscriptionFilter;

pub const DEFAULT_LIST_LIMIT: u32 = 20;
pub const MAX_LIST_LIMIT: u32 = 100;

#[derive(Debug, Clone, Default)]
pub struct ListSubscriptionsQuery {
    pub status: Option<SubscriptionStatus>,
    pub plan_id: Option<String>,
    /// Clamped to `1..=100`; defaults to 20.
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ListSubscriptionsResult {
    pub items: Vec<Subscription>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Clone)]
pub struct ListSubscriptionsHandler {
    ledger: LedgerContext,
}

impl ListSubscriptionsHandler {
    pub fn new(ledger: LedgerContext) -> Self {
        Self { ledger }
    }

    pub async fn handle(
        &self,
        query: ListSubscriptionsQuery,
    ) -> Result<ListSubscriptionsResult, LedgerError> {
        let plan_id = match &query.plan_id {
            Some(id) => Some(self.ledger.catalog().get_plan(id)?.id.clone()),
            None => None,
        };
        let filter = SubscriptionFilter {
            status: query.status,
            plan_id,
        };
        let limit = query
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);
        let offset = query.offset.unwrap_or(0);

        let page = self
            .ledger
            .call(self.ledger.store().list(&filter, limit, offset))
            .await?;

        Ok(ListSubscriptionsResult {
            items: page.items,
            total: page.total,
            limit,
            offset,
        })
    }
}
