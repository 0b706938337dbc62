//! GetSubscriptionStatsHandler - Query handler for admin revenue stats.
//!
//! Monthly recurring revenue counts `active` and `past_due` rows; yearly
//! plans contribute a twelfth of their price. Annual revenue is MRR x 12.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

use crate::application::ledger::LedgerContext;
use crate::domain::subscription::{LedgerError, SubscriptionStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubscriptionStats {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_plan: BTreeMap<String, u64>,
    pub monthly_recurring_revenue_minor: u64,
    pub annual_recurring_revenue_minor: u64,
}

#[derive(Clone)]
pub struct GetSubscriptionStatsHandler {
    ledger: LedgerContext,
}

impl GetSubscriptionStatsHandler {
    pub fn new(ledger: LedgerContext) -> Self {
        Self { ledger }
    }

    pub async fn handle(&self) -> Result<SubscriptionStats, LedgerError> {
        let counts = self.ledger.call(self.ledger.store().counts()).await?;

        let mut stats = SubscriptionStats::default();
        for status in SubscriptionStatus::ALL {
            stats.by_status.insert(status.as_str().to_string(), 0);
        }

        for ((status, plan_id), count) in counts.by_status_and_plan {
            stats.total += count;
            *stats.by_status.entry(status.as_str().to_string()).or_insert(0) += count;
            *stats.by_plan.entry(plan_id.as_str().to_string()).or_insert(0) += count;

            if !matches!(status, SubscriptionStatus::Active | SubscriptionStatus::PastDue) {
                continue;
            }
            match self.ledger.catalog().get_plan(plan_id.as_str()) {
                Ok(plan) => {
                    stats.monthly_recurring_revenue_minor += plan.monthly_price_minor_units() * count;
                }
                Err(_) => {
                    warn!(plan_id = %plan_id, count, "rows reference a plan missing from the catalog");
                }
            }
        }
        stats.annual_recurring_revenue_minor = stats.monthly_recurring_revenue_minor * 12;

        Ok(stats)
    }
}
