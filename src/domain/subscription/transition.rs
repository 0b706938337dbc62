//! Inputs and outcomes of subscription transitions.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::LedgerError;
use crate::domain::catalog::{PlanId, PriceComparison};
use crate::domain::foundation::Timestamp;

/// Transition requested by the provider reconciler or the sweeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Activate,
    RenewPeriod,
    MarkPastDue,
    Cancel,
    SyncFromProvider,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Activate => "activate",
            TransitionKind::RenewPeriod => "renew_period",
            TransitionKind::MarkPastDue => "mark_past_due",
            TransitionKind::Cancel => "cancel",
            TransitionKind::SyncFromProvider => "sync_from_provider",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provider-side identifiers linked to a subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRefs {
    pub customer: Option<String>,
    pub subscription: Option<String>,
    pub price: Option<String>,
}

impl ExternalRefs {
    pub fn is_empty(&self) -> bool {
        self.customer.is_none() && self.subscription.is_none() && self.price.is_none()
    }
}

/// What an external transition asserts about the subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEffect {
    /// Logical time of the change; events older than the last mutation are stale.
    pub occurred_at: Timestamp,
    pub period_start: Option<Timestamp>,
    pub period_end: Option<Timestamp>,
    pub refs: ExternalRefs,
    pub cancel_at_period_end: Option<bool>,
}

impl TransitionEffect {
    pub fn at(occurred_at: Timestamp) -> Self {
        Self {
            occurred_at,
            period_start: None,
            period_end: None,
            refs: ExternalRefs::default(),
            cancel_at_period_end: None,
        }
    }

    /// Sets the period only when both bounds are known and ordered.
    pub fn with_period(mut self, start: Option<Timestamp>, end: Option<Timestamp>) -> Self {
        if let (Some(start), Some(end)) = (start, end) {
            if start <= end {
                self.period_start = Some(start);
                self.period_end = Some(end);
            }
        }
        self
    }

    pub fn with_refs(mut self, refs: ExternalRefs) -> Self {
        self.refs = refs;
        self
    }

    pub fn with_cancel_at_period_end(mut self, flag: Option<bool>) -> Self {
        self.cancel_at_period_end = flag;
        self
    }

    pub fn period(&self) -> Option<(Timestamp, Timestamp)> {
        self.period_start.zip(self.period_end)
    }
}

/// Whether a transition changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    /// Already in the target state; nothing written.
    NoOp,
}

/// Direction the caller claims a plan change goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanChangeDirection {
    Upgrade,
    Downgrade,
}

impl PlanChangeDirection {
    /// Checks the claimed direction against the price comparison of new vs current.
    ///
    /// Equal-price moves are neither, so they fail both ways.
    pub fn validate(
        &self,
        new_vs_current: PriceComparison,
        from: &PlanId,
        to: &PlanId,
    ) -> Result<(), LedgerError> {
        let matches = matches!(
            (self, new_vs_current),
            (PlanChangeDirection::Upgrade, PriceComparison::Higher)
                | (PlanChangeDirection::Downgrade, PriceComparison::Lower)
        );
        if matches {
            Ok(())
        } else {
            Err(LedgerError::InvalidDirection {
                requested: *self,
                from: from.clone(),
                to: to.clone(),
            })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanChangeDirection::Upgrade => "upgrade",
            PlanChangeDirection::Downgrade => "downgrade",
        }
    }
}

impl fmt::Display for PlanChangeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
