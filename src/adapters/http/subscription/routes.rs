//! Axum router for subscription endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    admin_cancel_subscription, admin_change_plan, admin_reactivate_subscription,
    cancel_subscription, change_plan, check_feature_access, create_subscription,
    get_audit_trail, get_my_subscription, get_subscription_stats, list_plans,
    list_subscriptions, reactivate_subscription, SubscriptionAppState,
};

/// Create the subscription API router.
///
/// # Routes
///
/// ## User Endpoints (`X-User-Id` required)
/// - `GET /subscriptions/me` - caller's subscription and plan
/// - `GET /subscriptions/me/features/:feature` - feature access check
/// - `POST /subscriptions` - start a subscription
/// - `POST /subscriptions/:id/plan` - upgrade or downgrade
/// - `POST /subscriptions/:id/cancel` - cancel now or at period end
/// - `POST /subscriptions/:id/reactivate` - undo a cancellation
///
/// ## Admin Endpoints (`X-User-Id` on the admin list, else 403)
/// - `GET /subscriptions` - filtered listing
/// - `GET /subscriptions/stats` - counts and recurring revenue
/// - `GET /subscriptions/:id/audit` - audit trail
/// - `POST /admin/subscriptions/:id/cancel` - cancel any subscription, with a reason
/// - `POST /admin/subscriptions/:id/reactivate` - undo any cancellation, with a reason
/// - `POST /admin/subscriptions/:id/plan` - move to any plan, with a reason
///
/// ## Public
/// - `GET /plans` - plan catalog
pub fn subscription_router() -> Router<SubscriptionAppState> {
    Router::new()
        .route("/plans", get(list_plans))
        .route(
            "/subscriptions",
            get(list_subscriptions).post(create_subscription),
        )
        .route("/subscriptions/me", get(get_my_subscription))
        .route(
            "/subscriptions/me/features/:feature",
            get(check_feature_access),
        )
        .route("/subscriptions/stats", get(get_subscription_stats))
        .route("/subscriptions/:id/plan", post(change_plan))
        .route("/subscriptions/:id/cancel", post(cancel_subscription))
        .route("/subscriptions/:id/reactivate", post(reactivate_subscription))
        .route("/subscriptions/:id/audit", get(get_audit_trail))
        .route(
            "/admin/subscriptions/:id/cancel",
            post(admin_cancel_subscription),
        )
        .route(
            "/admin/subscriptions/:id/reactivate",
            post(admin_reactivate_subscription),
        )
        .route("/admin/subscriptions/:id/plan", post(admin_change_plan))
}
