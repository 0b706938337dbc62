//! HTTP DTOs for subscription endpoints.

use serde::{Deserialize, Serialize};

use crate::application::handlers::subscription::{
    FeatureAccess, GetSubscriptionResult, ListSubscriptionsResult,
};
use crate::domain::catalog::{BillingInterval, Plan};
use crate::domain::subscription::{PlanChangeDirection, Subscription, SubscriptionStatus};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub plan_id: String,
    /// No trial when absent.
    #[serde(default)]
    pub trial_days: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePlanRequest {
    pub plan_id: String,
    pub direction: PlanChangeDirection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelSubscriptionRequest {
    /// End now instead of at period end.
    #[serde(default)]
    pub immediate: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminCancelRequest {
    #[serde(default)]
    pub immediate: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminReactivateRequest {
    pub reason: String,
}

/// Any catalog plan; the direction rule does not apply to operators.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminChangePlanRequest {
    pub plan_id: String,
    pub reason: String,
}

/// Query string for the admin listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListSubscriptionsParams {
    pub status: Option<SubscriptionStatus>,
    pub plan_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionResponse {
    pub id: String,
    pub user_id: String,
    pub status: SubscriptionStatus,
    pub plan_id: String,
    pub current_period_start: String,
    pub current_period_end: String,
    pub cancel_at_period_end: bool,
    pub is_trialing: bool,
    pub trial_end: Option<String>,
    pub canceled_at: Option<String>,
    pub has_access: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Subscription> for SubscriptionResponse {
    fn from(sub: &Subscription) -> Self {
        Self {
            id: sub.id.to_string(),
            user_id: sub.user_id.to_string(),
            status: sub.status,
            plan_id: sub.plan_id.to_string(),
            current_period_start: sub.current_period_start.as_datetime().to_rfc3339(),
            current_period_end: sub.current_period_end.as_datetime().to_rfc3339(),
            cancel_at_period_end: sub.cancel_at_period_end,
            is_trialing: sub.is_trialing,
            trial_end: sub.trial_end.map(|t| t.as_datetime().to_rfc3339()),
            canceled_at: sub.canceled_at.map(|t| t.as_datetime().to_rfc3339()),
            has_access: sub.status.grants_access(),
            created_at: sub.created_at.as_datetime().to_rfc3339(),
            updated_at: sub.updated_at.as_datetime().to_rfc3339(),
        }
    }
}

/// Subscription with its plan, for the owner's view.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionDetailResponse {
    #[serde(flatten)]
    pub subscription: SubscriptionResponse,
    pub plan: Option<PlanResponse>,
}

impl From<GetSubscriptionResult> for SubscriptionDetailResponse {
    fn from(result: GetSubscriptionResult) -> Self {
        Self {
            subscription: SubscriptionResponse::from(&result.subscription),
            plan: result.plan.as_ref().map(PlanResponse::from),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionListResponse {
    pub items: Vec<SubscriptionResponse>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

impl From<ListSubscriptionsResult> for SubscriptionListResponse {
    fn from(result: ListSubscriptionsResult) -> Self {
        Self {
            items: result.items.iter().map(SubscriptionResponse::from).collect(),
            total: result.total,
            limit: result.limit,
            offset: result.offset,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanResponse {
    pub id: String,
    pub display_name: String,
    pub price_minor_units: u64,
    pub interval: BillingInterval,
    pub features: Vec<String>,
}

impl From<&Plan> for PlanResponse {
    fn from(plan: &Plan) -> Self {
        Self {
            id: plan.id.to_string(),
            display_name: plan.display_name.clone(),
            price_minor_units: plan.price_minor_units,
            interval: plan.interval,
            features: plan.features.iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureAccessResponse {
    pub feature: String,
    pub allowed: bool,
    pub plan_id: Option<String>,
}

impl FeatureAccessResponse {
    pub fn new(feature: String, access: FeatureAccess) -> Self {
        Self {
            feature,
            allowed: access.allowed,
            plan_id: access.plan_id.map(|p| p.to_string()),
        }
    }
}
