//! Subscription ledger handlers.

mod admin_override;
mod apply_external_transition;
mod attach_external_refs;
mod cancel_subscription;
mod change_plan;
mod check_feature_access;
mod create_subscription;
mod get_audit_trail;
mod get_subscription;
mod get_subscription_stats;
mod list_subscriptions;
mod reactivate_subscription;

// Commands
pub use admin_override::{
    AdminAction, AdminOverrideCommand, AdminOverrideHandler, AdminOverrideResult,
};
pub use apply_external_transition::{ApplyExternalTransitionCommand, ApplyExternalTransitionHandler};
pub use attach_external_refs::{
    AttachExternalRefsCommand, AttachExternalRefsHandler, AttachExternalRefsResult,
};
pub use cancel_subscription::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, CancelSubscriptionResult,
};
pub use change_plan::{ChangePlanCommand, ChangePlanHandler, ChangePlanResult};
pub use create_subscription::{
    CreateSubscriptionCommand, CreateSubscriptionHandler, CreateSubscriptionResult,
};
pub use reactivate_subscription::{
    ReactivateSubscriptionCommand, ReactivateSubscriptionHandler, ReactivateSubscriptionResult,
};

// Queries
pub use check_feature_access::{CheckFeatureAccessHandler, CheckFeatureAccessQuery, FeatureAccess};
pub use get_audit_trail::{GetAuditTrailHandler, GetAuditTrailQuery};
pub use get_subscription::{GetSubscriptionHandler, GetSubscriptionQuery, GetSubscriptionResult};
pub use get_subscription_stats::{GetSubscriptionStatsHandler, SubscriptionStats};
pub use list_subscriptions::{
    ListSubscriptionsHandler, ListSubscriptionsQuery, ListSubscriptionsResult, DEFAULT_LIST_LIMIT,
    MAX_LIST_LIMIT,
};
