//! Error bodies and the LedgerError → HTTP mapping.

use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use tracing::error;

use crate::domain::subscription::LedgerError;

/// Standard error body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}

/// API error type that converts ledger errors to HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub LedgerError);

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::InvalidDirection { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            LedgerError::AlreadySubscribed { .. }
            | LedgerError::NothingToReactivate { .. }
            | LedgerError::InvalidTransition { .. }
            | LedgerError::StaleEvent { .. }
            | LedgerError::Conflict(_) => StatusCode::CONFLICT,
            LedgerError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let message = match &self.0 {
            LedgerError::StoreUnavailable(detail) => {
                error!(error = %detail, "ledger store unavailable");
                "temporarily unavailable, retry later".to_string()
            }
            LedgerError::Conflict(_) => "concurrent modification, retry".to_string(),
            other => other.to_string(),
        };
        let body = ErrorResponse::new(self.0.code(), message);
        (status, Json(body)).into_response()
    }
}
