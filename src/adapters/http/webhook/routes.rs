//! Axum router for provider webhooks.

use axum::{routing::post, Router};

use super::handlers::{handle_provider_webhook, WebhookAppState};

/// Webhook routes; these carry no caller identity and rely on the signature.
///
/// - `POST /webhooks/provider`
pub fn webhook_router() -> Router<WebhookAppState> {
    Router::new().route("/webhooks/provider", post(handle_provider_webhook))
}
