//! Ledger error taxonomy.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | Validation | 400 |
//! | NotFound | 404 |
//! | AlreadySubscribed | 409 |
//! | InvalidDirection | 422 |
//! | NothingToReactivate | 422 |
//! | InvalidTransition | 422 |
//! | StaleEvent | 409 |
//! | Conflict | 409 |
//! | StoreUnavailable | 503 |

use thiserror::Error;

use super::{PlanChangeDirection, SubscriptionStatus};
use crate::domain::catalog::PlanId;
use crate::domain::foundation::{DomainError, SubscriptionId, Timestamp, UserId, ValidationError};

/// Errors raised by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("subscription not found: {0}")]
    NotFound(String),

    #[error("user {user_id} already has a live subscription")]
    AlreadySubscribed { user_id: UserId },

    #[error("plan change from {from} to {to} is not a {requested}")]
    InvalidDirection {
        requested: PlanChangeDirection,
        from: PlanId,
        to: PlanId,
    },

    #[error("nothing to reactivate on a {status} subscription")]
    NothingToReactivate { status: SubscriptionStatus },

    #[error("cannot {action} a {from} subscription")]
    InvalidTransition {
        from: SubscriptionStatus,
        action: String,
    },

    #[error("event at {occurred_at} is older than the last change at {updated_at}")]
    StaleEvent {
        occurred_at: Timestamp,
        updated_at: Timestamp,
    },

    #[error("subscription {0} was modified concurrently; retry budget exhausted")]
    Conflict(SubscriptionId),

    #[error("ledger store unavailable: {0}")]
    StoreUnavailable(String),
}

impl LedgerError {
    pub fn not_found(id: impl ToString) -> Self {
        LedgerError::NotFound(id.to_string())
    }

    pub fn already_subscribed(user_id: UserId) -> Self {
        LedgerError::AlreadySubscribed { user_id }
    }

    pub fn invalid_transition(from: SubscriptionStatus, action: impl Into<String>) -> Self {
        LedgerError::InvalidTransition {
            from,
            action: action.into(),
        }
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        LedgerError::StoreUnavailable(message.into())
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "VALIDATION_FAILED",
            LedgerError::NotFound(_) => "NOT_FOUND",
            LedgerError::AlreadySubscribed { .. } => "ALREADY_SUBSCRIBED",
            LedgerError::InvalidDirection { .. } => "INVALID_DIRECTION",
            LedgerError::NothingToReactivate { .. } => "NOTHING_TO_REACTIVATE",
            LedgerError::InvalidTransition { .. } => "INVALID_TRANSITION",
            LedgerError::StaleEvent { .. } => "STALE_EVENT",
            LedgerError::Conflict(_) => "CONFLICT",
            LedgerError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
        }
    }

    /// Business-rule rejections; these are audited as failed attempts.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            LedgerError::AlreadySubscribed { .. }
                | LedgerError::InvalidDirection { .. }
                | LedgerError::NothingToReactivate { .. }
                | LedgerError::InvalidTransition { .. }
                | LedgerError::StaleEvent { .. }
        )
    }

    /// Transient failures the caller may retry unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::Conflict(_) | LedgerError::StoreUnavailable(_)
        )
    }
}

impl From<DomainError> for LedgerError {
    fn from(err: DomainError) -> Self {
        use crate::domain::foundation::ErrorCode;
        match err.code {
            ErrorCode::ValidationFailed => {
                LedgerError::Validation(ValidationError::invalid_format(
                    err.details
                        .get("field")
                        .cloned()
                        .unwrap_or_else(|| "input".to_string()),
                    err.message,
                ))
            }
            ErrorCode::SubscriptionNotFound => LedgerError::NotFound(err.message),
            _ => LedgerError::StoreUnavailable(err.to_string()),
        }
    }
}
