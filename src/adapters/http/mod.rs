//! HTTP adapters - REST API implementations.
//!
//! Each area has its own router and state; `api_router` merges them and adds
//! the request-level layers.

mod error;
pub mod subscription;
pub mod webhook;

pub use error::{ApiError, ErrorResponse};
pub use subscription::{subscription_router, SubscriptionAppState};
pub use webhook::{webhook_router, WebhookAppState};

use std::time::Duration;

use axum::http::{HeaderValue, Method};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Full application router with tracing, timeout, and CORS layers.
///
/// An empty origin list allows any origin.
pub fn api_router(
    subscriptions: SubscriptionAppState,
    webhooks: WebhookAppState,
    request_timeout: Duration,
    cors_origins: &[String],
) -> Router {
    Router::new()
        .merge(subscription_router().with_state(subscriptions))
        .merge(webhook_router().with_state(webhooks))
        .layer(cors_layer(cors_origins))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    if parsed.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(parsed)
    }
}
