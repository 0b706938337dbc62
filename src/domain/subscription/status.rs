//! Subscription status state machine.

use crate::domain::foundation::{StateMachine, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Billing status of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Free trial window; no payment taken yet.
    Trialing,

    /// Paid and in good standing.
    Active,

    /// Latest payment failed; access retained while the provider retries.
    PastDue,

    /// Ended. Only a user reactivation or a new subscription leaves this state.
    Canceled,
}

impl SubscriptionStatus {
    pub const ALL: [SubscriptionStatus; 4] = [
        SubscriptionStatus::Trialing,
        SubscriptionStatus::Active,
        SubscriptionStatus::PastDue,
        SubscriptionStatus::Canceled,
    ];

    /// Trialing, active and past-due subscriptions unlock plan features.
    pub fn grants_access(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Trialing | SubscriptionStatus::Active | SubscriptionStatus::PastDue
        )
    }

    /// A live subscription counts against the one-per-user limit.
    pub fn is_live(&self) -> bool {
        !matches!(self, SubscriptionStatus::Canceled)
    }

    /// Whether a pending cancellation may be scheduled from this status.
    pub fn allows_pending_cancel(&self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::Trialing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trialing" => Ok(SubscriptionStatus::Trialing),
            "active" => Ok(SubscriptionStatus::Active),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown subscription status '{}'", other),
            )),
        }
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            // From TRIALING
            (Trialing, Active)
                | (Trialing, PastDue)
                | (Trialing, Canceled)
            // From ACTIVE
                | (Active, Active) // Renewal
                | (Active, PastDue)
                | (Active, Canceled)
            // From PAST_DUE
                | (PastDue, Active)
                | (PastDue, Canceled)
            // From CANCELED
                | (Canceled, Active) // Reactivation
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Trialing => vec![Active, PastDue, Canceled],
            Active => vec![Active, PastDue, Canceled],
            PastDue => vec![Active, Canceled],
            Canceled => vec![Active],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trialing_can_convert_or_lapse() {
        let status = SubscriptionStatus::Trialing;
        assert_eq!(
            status.transition_to(SubscriptionStatus::Active),
            Ok(SubscriptionStatus::Active)
        );
        assert!(status.can_transition_to(&SubscriptionStatus::PastDue));
        assert!(status.can_transition_to(&SubscriptionStatus::Canceled));
    }

    #[test]
    fn past_due_cannot_go_back_to_trialing() {
        assert!(SubscriptionStatus::PastDue
            .transition_to(SubscriptionStatus::Trialing)
            .is_err());
    }

    #[test]
    fn canceled_only_reactivates() {
        assert_eq!(
            SubscriptionStatus::Canceled.valid_transitions(),
            vec![SubscriptionStatus::Active]
        );
        assert!(!SubscriptionStatus::Canceled.can_transition_to(&SubscriptionStatus::PastDue));
    }

    #[test]
    fn nothing_transitions_into_trialing() {
        for status in SubscriptionStatus::ALL {
            assert!(!status.can_transition_to(&SubscriptionStatus::Trialing));
        }
    }

    #[test]
    fn can_transition_to_is_consistent_with_valid_transitions() {
        for status in SubscriptionStatus::ALL {
            for target in status.valid_transitions() {
                assert!(
                    status.can_transition_to(&target),
                    "{:?} -> {:?} should be allowed",
                    status,
                    target
                );
            }
        }
    }

    #[test]
    fn access_is_granted_to_live_statuses() {
        assert!(SubscriptionStatus::Trialing.grants_access());
        assert!(SubscriptionStatus::Active.grants_access());
        assert!(SubscriptionStatus::PastDue.grants_access());
        assert!(!SubscriptionStatus::Canceled.grants_access());
    }

    #[test]
    fn pending_cancel_only_from_active_or_trialing() {
        assert!(SubscriptionStatus::Active.allows_pending_cancel());
        assert!(SubscriptionStatus::Trialing.allows_pending_cancel());
        assert!(!SubscriptionStatus::PastDue.allows_pending_cancel());
        assert!(!SubscriptionStatus::Canceled.allows_pending_cancel());
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in SubscriptionStatus::ALL {
            assert_eq!(status.as_str().parse::<SubscriptionStatus>(), Ok(status));
        }
        assert!("expired".parse::<SubscriptionStatus>().is_err());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&SubscriptionStatus::PastDue).unwrap();
        assert_eq!(json, "\"past_due\"");
    }
}
