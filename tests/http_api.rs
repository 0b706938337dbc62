//! HTTP API tests driving the full router with in-memory stores.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::TestApp;

// =============================================================================
// Request helpers
// =============================================================================

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(user) = user {
        builder = builder.header("X-User-Id", user);
    }
    builder.body(Body::empty()).unwrap()
}

fn post(uri: &str, user: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("X-User-Id", user);
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn subscribe(router: &Router, user: &str, plan: &str) -> String {
    let (status, body) = send(
        router,
        post("/subscriptions", user, Some(json!({ "plan_id": plan }))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

// =============================================================================
// Catalog and identity
// =============================================================================

#[tokio::test]
async fn plans_are_listed_cheapest_first() {
    let router = TestApp::new().router();

    let (status, body) = send(&router, get("/plans", None)).await;

    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["free", "premium", "pro", "premium_annual"]);
    assert_eq!(body[1]["price_minor_units"], 999);
}

#[tokio::test]
async fn user_endpoints_require_caller_identity() {
    let router = TestApp::new().router();

    let (status, body) = send(&router, get("/subscriptions/me", None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_code"], "AUTHENTICATION_REQUIRED");
}

// =============================================================================
// Subscription commands
// =============================================================================

#[tokio::test]
async fn create_returns_trialing_subscription_and_blocks_a_second() {
    let router = TestApp::new().router();

    let (status, body) = send(
        &router,
        post(
            "/subscriptions",
            "7",
            Some(json!({ "plan_id": "premium", "trial_days": 14 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "trialing");
    assert_eq!(body["is_trialing"], true);
    assert_eq!(body["has_access"], true);

    let (status, body) = send(
        &router,
        post("/subscriptions", "7", Some(json!({ "plan_id": "pro" }))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_code"], "ALREADY_SUBSCRIBED");

    let (status, body) = send(&router, get("/subscriptions/me", Some("7"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plan_id"], "premium");
    assert_eq!(body["plan"]["id"], "premium");
}

#[tokio::test]
async fn unknown_plan_is_a_bad_request() {
    let router = TestApp::new().router();

    let (status, body) = send(
        &router,
        post("/subscriptions", "7", Some(json!({ "plan_id": "gold" }))),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn plan_change_direction_is_enforced() {
    let router = TestApp::new().router();
    let id = subscribe(&router, "7", "premium").await;
    let uri = format!("/subscriptions/{}/plan", id);

    let (status, body) = send(
        &router,
        post(&uri, "7", Some(json!({ "plan_id": "free", "direction": "upgrade" }))),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error_code"], "INVALID_DIRECTION");

    let (status, body) = send(
        &router,
        post(&uri, "7", Some(json!({ "plan_id": "pro", "direction": "upgrade" }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plan_id"], "pro");
}

#[tokio::test]
async fn other_users_cannot_touch_a_subscription() {
    let router = TestApp::new().router();
    let id = subscribe(&router, "7", "premium").await;

    let (status, _) = send(
        &router,
        post(&format!("/subscriptions/{}/cancel", id), "8", None),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_without_body_schedules_and_reactivate_undoes_it() {
    let router = TestApp::new().router();
    let id = subscribe(&router, "7", "premium").await;

    let (status, body) = send(
        &router,
        post(&format!("/subscriptions/{}/cancel", id), "7", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "active");
    assert_eq!(body["cancel_at_period_end"], true);

    let (status, body) = send(
        &router,
        post(&format!("/subscriptions/{}/reactivate", id), "7", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancel_at_period_end"], false);

    let (status, body) = send(
        &router,
        post(&format!("/subscriptions/{}/reactivate", id), "7", None),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_code"], "NOTHING_TO_REACTIVATE");
}

#[tokio::test]
async fn immediate_cancel_revokes_feature_access() {
    let router = TestApp::new().router();
    let id = subscribe(&router, "7", "premium").await;

    let (_, body) = send(&router, get("/subscriptions/me/features/volume_alerts", Some("7"))).await;
    assert_eq!(body["allowed"], true);

    let (status, body) = send(
        &router,
        post(
            &format!("/subscriptions/{}/cancel", id),
            "7",
            Some(json!({ "immediate": true })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "canceled");
    assert_eq!(body["has_access"], false);

    let (_, body) = send(&router, get("/subscriptions/me/features/volume_alerts", Some("7"))).await;
    assert_eq!(body["allowed"], false);
}

// =============================================================================
// Admin queries
// =============================================================================

#[tokio::test]
async fn listing_stats_and_audit_trail() {
    let router = TestApp::new().router();
    let id = subscribe(&router, "1", "premium").await;
    subscribe(&router, "2", "pro").await;
    subscribe(&router, "3", "premium").await;

    let (status, body) = send(&router, get("/subscriptions?plan_id=premium&limit=1", Some("admin"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["limit"], 1);

    let (status, body) = send(&router, get("/subscriptions/stats", Some("admin"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["by_plan"]["premium"], 2);
    assert_eq!(body["monthly_recurring_revenue_minor"], 999 * 2 + 1999);

    let (status, body) = send(&router, get(&format!("/subscriptions/{}/audit", id), Some("admin"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["action"], "create");
    assert_eq!(body[0]["success"], true);
}

#[tokio::test]
async fn admin_routes_refuse_other_callers() {
    let router = TestApp::new().router();
    let id = subscribe(&router, "1", "premium").await;

    let (status, body) = send(&router, get("/subscriptions", Some("1"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error_code"], "FORBIDDEN");

    let (status, _) = send(&router, get(&format!("/subscriptions/{}/audit", id), Some("1"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&router, get("/subscriptions/stats", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &router,
        post(
            &format!("/admin/subscriptions/{}/cancel", id),
            "1",
            Some(json!({ "immediate": true, "reason": "self-service" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn reserved_actor_ids_are_not_callers() {
    let router = TestApp::new().router();

    for id in ["webhook", "sweeper", "admin:admin"] {
        let (status, _) = send(&router, get("/subscriptions/me", Some(id))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", id);
    }
}

// =============================================================================
// Admin overrides
// =============================================================================

#[tokio::test]
async fn admin_overrides_are_audited_with_reason() {
    let router = TestApp::new().router();
    let id = subscribe(&router, "7", "premium").await;

    let (status, body) = send(
        &router,
        post(
            &format!("/admin/subscriptions/{}/cancel", id),
            "admin",
            Some(json!({ "immediate": true, "reason": "chargeback filed" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "canceled");

    let (status, body) = send(
        &router,
        post(
            &format!("/admin/subscriptions/{}/reactivate", id),
            "admin",
            Some(json!({ "reason": "chargeback withdrawn" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "active");

    let (status, body) = send(
        &router,
        post(
            &format!("/admin/subscriptions/{}/plan", id),
            "admin",
            Some(json!({ "plan_id": "pro", "reason": "goodwill upgrade" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plan_id"], "pro");

    let (_, trail) = send(&router, get(&format!("/subscriptions/{}/audit", id), Some("admin"))).await;
    let trail = trail.as_array().unwrap();
    assert_eq!(trail.len(), 4);
    assert_eq!(trail[1]["action"], "admin_cancel_immediately");
    assert_eq!(trail[1]["actor"]["kind"], "admin");
    assert_eq!(trail[1]["actor"]["id"], "admin");
    assert_eq!(trail[1]["reason"], "chargeback filed");
    assert_eq!(trail[2]["reason"], "chargeback withdrawn");
    assert_eq!(trail[3]["action"], "admin_change_plan");
    assert_eq!(trail[3]["reason"], "goodwill upgrade");
}

#[tokio::test]
async fn admin_override_requires_a_reason() {
    let router = TestApp::new().router();
    let id = subscribe(&router, "7", "premium").await;
    let uri = format!("/admin/subscriptions/{}/cancel", id);

    let (status, _) = send(&router, post(&uri, "admin", Some(json!({ "immediate": true })))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(
        &router,
        post(&uri, "admin", Some(json!({ "immediate": true, "reason": " " }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "VALIDATION_FAILED");
}

// =============================================================================
// Provider webhooks
// =============================================================================

fn webhook(body: &[u8], signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhooks/provider")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header("Provider-Signature", signature);
    }
    builder.body(Body::from(body.to_vec())).unwrap()
}

#[tokio::test]
async fn signed_webhook_is_acknowledged() {
    let app = TestApp::new();
    let router = app.router();
    let delivery = app.signed_event("evt_1", "charge.refunded", json!({ "id": "ch_1" }));

    let (status, body) = send(
        &router,
        webhook(&delivery.payload, delivery.signature.as_deref()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["event_id"], "evt_1");
    assert_eq!(body["outcome"], "duplicate-skipped");
}

#[tokio::test]
async fn legacy_signature_header_is_accepted() {
    let app = TestApp::new();
    let router = app.router();
    let delivery = app.signed_event("evt_1", "charge.refunded", json!({ "id": "ch_1" }));
    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/provider")
        .header("Stripe-Signature", delivery.signature.unwrap())
        .body(Body::from(delivery.payload))
        .unwrap();

    let (status, _) = send(&router, request).await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unsigned_webhook_is_rejected_with_generic_message() {
    let app = TestApp::new();
    let router = app.router();
    let delivery = app.signed_event("evt_1", "charge.refunded", json!({ "id": "ch_1" }));

    let (status, body) = send(&router, webhook(&delivery.payload, None)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "WEBHOOK_VERIFICATION_FAILED");
    assert_eq!(body["message"], "webhook verification failed");
    assert!(app.events.is_empty().await);
}
