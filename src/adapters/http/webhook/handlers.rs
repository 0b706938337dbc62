//! HTTP handler for provider webhooks.
//!
//! Signature failures get a fixed body so callers learn nothing about why.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use serde::Serialize;
use tracing::error;

use crate::adapters::http::error::ErrorResponse;
use crate::application::handlers::webhook::{
    ReconcileProviderEventCommand, ReconcileProviderEventHandler,
};
use crate::domain::webhook::WebhookError;
use crate::ports::EventOutcome;

/// Primary signature header.
pub const SIGNATURE_HEADER: &str = "Provider-Signature";

/// Accepted alias for providers that use their own header name.
pub const SIGNATURE_HEADER_ALIAS: &str = "Stripe-Signature";

#[derive(Clone)]
pub struct WebhookAppState {
    pub reconciler: Arc<ReconcileProviderEventHandler>,
}

impl WebhookAppState {
    pub fn new(reconciler: ReconcileProviderEventHandler) -> Self {
        Self {
            reconciler: Arc::new(reconciler),
        }
    }
}

/// Acknowledgement body.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub event_id: String,
    pub outcome: EventOutcome,
}

/// POST /webhooks/provider
pub async fn handle_provider_webhook(
    State(state): State<WebhookAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .or_else(|| headers.get(SIGNATURE_HEADER_ALIAS))
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let result = state
        .reconciler
        .handle(ReconcileProviderEventCommand {
            payload: body.to_vec(),
            signature,
        })
        .await?;

    Ok((
        StatusCode::OK,
        Json(WebhookAck {
            event_id: result.event_id,
            outcome: result.outcome,
        }),
    ))
}

/// API error type for the webhook endpoint.
#[derive(Debug)]
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> axum::response::Response {
        if self.0.is_retryable() {
            error!(error = %self.0, "webhook processing failed, provider will redeliver");
        }
        let code = match &self.0 {
            WebhookError::SignatureInvalid(_) => "WEBHOOK_VERIFICATION_FAILED",
            WebhookError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            WebhookError::Ledger(_) | WebhookError::Store(_) => "TEMPORARILY_UNAVAILABLE",
        };
        let body = ErrorResponse::new(code, self.0.public_message());
        (self.0.status_code(), Json(body)).into_response()
    }
}
