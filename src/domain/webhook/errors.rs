//! Webhook error types.
//!
//! Status codes drive the provider's redelivery: 2xx acknowledges, 4xx is
//! never retried, 5xx is redelivered later.

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::subscription::LedgerError;

/// Why signature verification failed. Logged, never returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureFailure {
    MissingHeader,
    MalformedHeader,
    TimestampTooOld,
    TimestampInFuture,
    Mismatch,
}

impl SignatureFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureFailure::MissingHeader => "missing_header",
            SignatureFailure::MalformedHeader => "malformed_header",
            SignatureFailure::TimestampTooOld => "timestamp_too_old",
            SignatureFailure::TimestampInFuture => "timestamp_in_future",
            SignatureFailure::Mismatch => "signature_mismatch",
        }
    }
}

/// Errors that occur during webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Authenticity check failed. Displays the same text for every reason.
    #[error("Invalid signature")]
    SignatureInvalid(SignatureFailure),

    /// Signed payload that is not a well-formed provider event.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Ledger failed for a transient reason; the provider should redeliver.
    #[error("Ledger unavailable: {0}")]
    Ledger(LedgerError),

    /// Processed-event store failed.
    #[error("Event store unavailable: {0}")]
    Store(String),
}

impl WebhookError {
    pub fn signature(reason: SignatureFailure) -> Self {
        WebhookError::SignatureInvalid(reason)
    }

    /// Returns true if the provider should redeliver this event.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::Ledger(_) | WebhookError::Store(_))
    }

    /// Maps the error to the HTTP status returned to the provider.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::SignatureInvalid(_) | WebhookError::MalformedPayload(_) => {
                StatusCode::BAD_REQUEST
            }
            WebhookError::Ledger(_) | WebhookError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Body text safe to send back; internal detail stays in the logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            WebhookError::SignatureInvalid(_) => "webhook verification failed",
            WebhookError::MalformedPayload(_) => "malformed webhook payload",
            WebhookError::Ledger(_) | WebhookError::Store(_) => {
                "temporarily unavailable, retry later"
            }
        }
    }
}
