//! HTTP handlers for subscription endpoints.
//!
//! These handlers connect Axum routes to application layer command/query handlers.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::warn;

use super::dto::{
    AdminCancelRequest, AdminChangePlanRequest, AdminReactivateRequest,
    CancelSubscriptionRequest, ChangePlanRequest, CreateSubscriptionRequest,
    FeatureAccessResponse, ListSubscriptionsParams, PlanResponse, SubscriptionDetailResponse,
    SubscriptionListResponse, SubscriptionResponse,
};
use crate::adapters::http::error::{ApiError, ErrorResponse};
use crate::application::handlers::subscription::{
    AdminAction, AdminOverrideCommand, AdminOverrideHandler,
    CancelSubscriptionCommand, CancelSubscriptionHandler, ChangePlanCommand, ChangePlanHandler,
    CheckFeatureAccessHandler, CheckFeatureAccessQuery, CreateSubscriptionCommand,
    CreateSubscriptionHandler, GetAuditTrailHandler, GetAuditTrailQuery, GetSubscriptionHandler,
    GetSubscriptionQuery, GetSubscriptionStatsHandler, ListSubscriptionsHandler,
    ListSubscriptionsQuery, ReactivateSubscriptionCommand, ReactivateSubscriptionHandler,
};
use crate::application::LedgerContext;
use crate::domain::audit::Actor;
use crate::domain::foundation::{SubscriptionId, UserId};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for subscription routes; handlers are built per request.
#[derive(Clone)]
pub struct SubscriptionAppState {
    pub ledger: LedgerContext,
    admins: Arc<HashSet<UserId>>,
}

impl SubscriptionAppState {
    /// No caller is an admin until `with_admins` names some.
    pub fn new(ledger: LedgerContext) -> Self {
        Self {
            ledger,
            admins: Arc::new(HashSet::new()),
        }
    }

    pub fn with_admins(mut self, ids: &[String]) -> Self {
        self.admins = Arc::new(ids.iter().filter_map(|id| UserId::new(id.trim()).ok()).collect());
        self
    }

    fn is_admin(&self, user_id: &UserId) -> bool {
        self.admins.contains(user_id)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Caller identity
// ════════════════════════════════════════════════════════════════════════════════

/// Caller identity from the `X-User-Id` header.
///
/// Authentication happens upstream; this only names the caller.
#[derive(Debug, Clone)]
pub struct CallerId {
    pub user_id: UserId,
}

impl CallerId {
    fn actor(&self) -> Actor {
        Actor::User(self.user_id.clone())
    }
}

/// Rejection when the identity header is missing or empty.
pub struct CallerIdRequired;

impl IntoResponse for CallerIdRequired {
    fn into_response(self) -> axum::response::Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "X-User-Id header is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = CallerIdRequired;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        // Ids reserved for system actors never name a caller.
        let user_id = parts
            .headers
            .get("X-User-Id")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| match Actor::from_id(s.trim()) {
                Some(Actor::User(user_id)) => Some(user_id),
                _ => None,
            })
            .ok_or(CallerIdRequired)?;

        Ok(CallerId { user_id })
    }
}

/// A caller on the configured admin list.
#[derive(Debug, Clone)]
pub struct AdminCaller {
    pub user_id: UserId,
}

pub enum AdminRejection {
    Unauthenticated(CallerIdRequired),
    Forbidden,
}

impl IntoResponse for AdminRejection {
    fn into_response(self) -> axum::response::Response {
        match self {
            AdminRejection::Unauthenticated(inner) => inner.into_response(),
            AdminRejection::Forbidden => {
                let error = ErrorResponse::new("FORBIDDEN", "admin access required");
                (StatusCode::FORBIDDEN, Json(error)).into_response()
            }
        }
    }
}

#[axum::async_trait]
impl axum::extract::FromRequestParts<SubscriptionAppState> for AdminCaller {
    type Rejection = AdminRejection;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &SubscriptionAppState,
    ) -> Result<Self, Self::Rejection> {
        let caller =
            <CallerId as axum::extract::FromRequestParts<SubscriptionAppState>>::from_request_parts(
                parts, state,
            )
            .await
            .map_err(AdminRejection::Unauthenticated)?;
        if !state.is_admin(&caller.user_id) {
            warn!(target: "security", user_id = %caller.user_id, path = %parts.uri.path(), "admin route refused");
            return Err(AdminRejection::Forbidden);
        }
        Ok(AdminCaller {
            user_id: caller.user_id,
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /subscriptions/me - the caller's live (or latest) subscription
pub async fn get_my_subscription(
    State(state): State<SubscriptionAppState>,
    caller: CallerId,
) -> Result<impl IntoResponse, ApiError> {
    let handler = GetSubscriptionHandler::new(state.ledger);
    let result = handler
        .handle(GetSubscriptionQuery::ForUser(caller.user_id))
        .await?;

    Ok(Json(SubscriptionDetailResponse::from(result)))
}

/// GET /subscriptions/me/features/:feature
pub async fn check_feature_access(
    State(state): State<SubscriptionAppState>,
    caller: CallerId,
    Path(feature): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let handler = CheckFeatureAccessHandler::new(state.ledger);
    let access = handler
        .handle(CheckFeatureAccessQuery {
            user_id: caller.user_id,
            feature: feature.clone(),
        })
        .await?;

    Ok(Json(FeatureAccessResponse::new(feature, access)))
}

/// GET /subscriptions - admin listing
pub async fn list_subscriptions(
    State(state): State<SubscriptionAppState>,
    _admin: AdminCaller,
    Query(params): Query<ListSubscriptionsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let handler = ListSubscriptionsHandler::new(state.ledger);
    let result = handler
        .handle(ListSubscriptionsQuery {
            status: params.status,
            plan_id: params.plan_id,
            limit: params.limit,
            offset: params.offset,
        })
        .await?;

    Ok(Json(SubscriptionListResponse::from(result)))
}

/// GET /subscriptions/stats - admin statistics
pub async fn get_subscription_stats(
    State(state): State<SubscriptionAppState>,
    _admin: AdminCaller,
) -> Result<impl IntoResponse, ApiError> {
    let stats = GetSubscriptionStatsHandler::new(state.ledger).handle().await?;
    Ok(Json(stats))
}

/// GET /subscriptions/:id/audit - admin audit trail
pub async fn get_audit_trail(
    State(state): State<SubscriptionAppState>,
    _admin: AdminCaller,
    Path(subscription_id): Path<SubscriptionId>,
) -> Result<impl IntoResponse, ApiError> {
    let records = GetAuditTrailHandler::new(state.ledger)
        .handle(GetAuditTrailQuery { subscription_id })
        .await?;
    Ok(Json(records))
}

/// GET /plans - the catalog
pub async fn list_plans(State(state): State<SubscriptionAppState>) -> impl IntoResponse {
    let plans: Vec<PlanResponse> = state
        .ledger
        .catalog()
        .plans()
        .iter()
        .map(PlanResponse::from)
        .collect();
    Json(plans)
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /subscriptions
pub async fn create_subscription(
    State(state): State<SubscriptionAppState>,
    caller: CallerId,
    Json(request): Json<CreateSubscriptionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let handler = CreateSubscriptionHandler::new(state.ledger);
    let result = handler
        .handle(CreateSubscriptionCommand {
            user_id: caller.user_id,
            plan_id: request.plan_id,
            trial_days: request.trial_days,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SubscriptionResponse::from(&result.subscription)),
    ))
}

/// POST /subscriptions/:id/plan
pub async fn change_plan(
    State(state): State<SubscriptionAppState>,
    caller: CallerId,
    Path(subscription_id): Path<SubscriptionId>,
    Json(request): Json<ChangePlanRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let handler = ChangePlanHandler::new(state.ledger);
    let result = handler
        .handle(ChangePlanCommand {
            subscription_id,
            actor: caller.actor(),
            new_plan_id: request.plan_id,
            direction: request.direction,
        })
        .await?;

    Ok(Json(SubscriptionResponse::from(&result.subscription)))
}

/// POST /subscriptions/:id/cancel
///
/// An empty body cancels at period end.
pub async fn cancel_subscription(
    State(state): State<SubscriptionAppState>,
    caller: CallerId,
    Path(subscription_id): Path<SubscriptionId>,
    request: Option<Json<CancelSubscriptionRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let immediate = request.map(|Json(r)| r.immediate).unwrap_or(false);
    let handler = CancelSubscriptionHandler::new(state.ledger);
    let result = handler
        .handle(CancelSubscriptionCommand {
            subscription_id,
            actor: caller.actor(),
            immediate,
        })
        .await?;

    Ok(Json(SubscriptionResponse::from(&result.subscription)))
}

/// POST /subscriptions/:id/reactivate
pub async fn reactivate_subscription(
    State(state): State<SubscriptionAppState>,
    caller: CallerId,
    Path(subscription_id): Path<SubscriptionId>,
) -> Result<impl IntoResponse, ApiError> {
    let handler = ReactivateSubscriptionHandler::new(state.ledger);
    let result = handler
        .handle(ReactivateSubscriptionCommand {
            subscription_id,
            actor: caller.actor(),
        })
        .await?;

    Ok(Json(SubscriptionResponse::from(&result.subscription)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Admin Command Handlers
// ════════════════════════════════════════════════════════════════════════════════

async fn admin_override(
    state: SubscriptionAppState,
    admin: AdminCaller,
    subscription_id: SubscriptionId,
    action: AdminAction,
    reason: String,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let result = AdminOverrideHandler::new(state.ledger)
        .handle(AdminOverrideCommand {
            subscription_id,
            admin: admin.user_id,
            action,
            reason,
        })
        .await?;

    Ok(Json(SubscriptionResponse::from(&result.subscription)))
}

/// POST /admin/subscriptions/:id/cancel
pub async fn admin_cancel_subscription(
    State(state): State<SubscriptionAppState>,
    admin: AdminCaller,
    Path(subscription_id): Path<SubscriptionId>,
    Json(request): Json<AdminCancelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let action = AdminAction::Cancel {
        immediate: request.immediate,
    };
    admin_override(state, admin, subscription_id, action, request.reason).await
}

/// POST /admin/subscriptions/:id/reactivate
pub async fn admin_reactivate_subscription(
    State(state): State<SubscriptionAppState>,
    admin: AdminCaller,
    Path(subscription_id): Path<SubscriptionId>,
    Json(request): Json<AdminReactivateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    admin_override(state, admin, subscription_id, AdminAction::Reactivate, request.reason).await
}

/// POST /admin/subscriptions/:id/plan
pub async fn admin_change_plan(
    State(state): State<SubscriptionAppState>,
    admin: AdminCaller,
    Path(subscription_id): Path<SubscriptionId>,
    Json(request): Json<AdminChangePlanRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let action = AdminAction::ChangePlan {
        plan_id: request.plan_id,
    };
    admin_override(state, admin, subscription_id, action, request.reason).await
}
