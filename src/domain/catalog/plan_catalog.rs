//! Plan catalog - static lookup table of plans.
//!
//! The catalog is read-only after construction and is shared across tasks
//! behind an `Arc`.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{BillingInterval, Plan, PlanId};
use crate::domain::foundation::ValidationError;

/// Result of comparing two plans by price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceComparison {
    Lower,
    Equal,
    Higher,
}

/// Built-in plans offered when no custom catalog is supplied.
static STANDARD_PLANS: Lazy<Vec<Plan>> = Lazy::new(|| {
    vec![
        Plan::new(PlanId("free".to_string()), "Free", 0, BillingInterval::Month).with_features([
            "item_tracking",
            "limited_watchlist",
            "basic_price_alerts",
            "community_access",
        ]),
        Plan::new(PlanId("premium".to_string()), "Premium", 999, BillingInterval::Month)
            .with_features([
                "item_tracking",
                "unlimited_watchlist",
                "advanced_price_alerts",
                "volume_alerts",
                "profit_tracking",
                "historical_data",
                "priority_support",
            ])
            .with_external_price_ref("price_premium_monthly"),
        Plan::new(PlanId("pro".to_string()), "Pro", 1999, BillingInterval::Month)
            .with_features([
                "item_tracking",
                "unlimited_watchlist",
                "advanced_price_alerts",
                "volume_alerts",
                "profit_tracking",
                "historical_data",
                "priority_support",
                "ai_predictions",
                "whale_tracking",
                "advanced_analytics",
                "api_access",
            ])
            .with_external_price_ref("price_pro_monthly"),
        Plan::new(
            PlanId("premium_annual".to_string()),
            "Premium (Annual)",
            9999,
            BillingInterval::Year,
        )
        .with_features([
            "item_tracking",
            "unlimited_watchlist",
            "advanced_price_alerts",
            "volume_alerts",
            "profit_tracking",
            "historical_data",
            "priority_support",
        ])
        .with_external_price_ref("price_premium_yearly"),
    ]
});

/// Immutable table of plan id to plan.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    /// Sorted by price ascending, then id.
    plans: Vec<Plan>,
    index: HashMap<PlanId, usize>,
}

impl PlanCatalog {
    /// Builds a catalog, rejecting duplicate plan ids.
    pub fn new(mut plans: Vec<Plan>) -> Result<Self, ValidationError> {
        plans.sort_by(|a, b| {
            a.price_minor_units
                .cmp(&b.price_minor_units)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut index = HashMap::with_capacity(plans.len());
        for (position, plan) in plans.iter().enumerate() {
            if index.insert(plan.id.clone(), position).is_some() {
                return Err(ValidationError::invalid_format(
                    "plan_id",
                    format!("duplicate plan '{}'", plan.id),
                ));
            }
        }

        Ok(Self { plans, index })
    }

    /// The built-in free/premium/pro/premium_annual catalog.
    pub fn standard() -> Self {
        let plans = STANDARD_PLANS.clone();
        let index = plans
            .iter()
            .enumerate()
            .map(|(position, plan)| (plan.id.clone(), position))
            .collect();
        Self { plans, index }
    }

    /// Looks up a plan, failing with `UnknownPlan` for ids not in the catalog.
    pub fn get_plan(&self, id: &str) -> Result<&Plan, ValidationError> {
        PlanId::new(id)
            .ok()
            .and_then(|key| self.index.get(&key))
            .and_then(|&position| self.plans.get(position))
            .ok_or_else(|| ValidationError::unknown_plan(id))
    }

    /// Compares plan `a` against plan `b` by price.
    pub fn compare(&self, a: &str, b: &str) -> Result<PriceComparison, ValidationError> {
        let a = self.get_plan(a)?;
        let b = self.get_plan(b)?;
        Ok(match a.price_minor_units.cmp(&b.price_minor_units) {
            std::cmp::Ordering::Less => PriceComparison::Lower,
            std::cmp::Ordering::Equal => PriceComparison::Equal,
            std::cmp::Ordering::Greater => PriceComparison::Higher,
        })
    }

    /// All plans in ascending price order.
    pub fn plans(&self) -> &[Plan] {
        &self.plans
    }

    /// Unknown plans have no features.
    pub fn has_feature(&self, plan_id: &str, feature: &str) -> bool {
        self.get_plan(plan_id)
            .map(|plan| plan.has_feature(feature))
            .unwrap_or(false)
    }

    /// Finds the plan sold under a provider price id.
    pub fn find_by_external_price_ref(&self, price_ref: &str) -> Option<&Plan> {
        self.plans
            .iter()
            .find(|plan| plan.external_price_ref.as_deref() == Some(price_ref))
    }
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
