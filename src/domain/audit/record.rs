//! Audit trail entries.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

use crate::domain::foundation::{AuditRecordId, SubscriptionId, Timestamp, UserId};
use crate::domain::subscription::Subscription;

/// Who caused a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Actor {
    User(UserId),
    /// Operator acting on someone else's subscription.
    Admin(UserId),
    Webhook,
    Sweeper,
}

const ADMIN_PREFIX: &str = "admin:";

impl Actor {
    /// Flat identifier stored with the record.
    pub fn as_id(&self) -> Cow<'_, str> {
        match self {
            Actor::User(user_id) => Cow::Borrowed(user_id.as_str()),
            Actor::Admin(user_id) => Cow::Owned(format!("{}{}", ADMIN_PREFIX, user_id)),
            Actor::Webhook => Cow::Borrowed("webhook"),
            Actor::Sweeper => Cow::Borrowed("sweeper"),
        }
    }

    /// Inverse of `as_id`; any other non-empty id is a user.
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "webhook" => Some(Actor::Webhook),
            "sweeper" => Some(Actor::Sweeper),
            other => match other.strip_prefix(ADMIN_PREFIX) {
                Some(admin) => UserId::new(admin).ok().map(Actor::Admin),
                None => UserId::new(other).ok().map(Actor::User),
            },
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_id())
    }
}

/// Immutable record of one attempted mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: AuditRecordId,
    pub actor: Option<Actor>,
    pub action: String,
    pub target_subscription_id: Option<SubscriptionId>,
    /// JSON snapshot of the subscription before the change.
    pub before_state: Option<serde_json::Value>,
    pub after_state: Option<serde_json::Value>,
    pub success: bool,
    pub error_detail: Option<String>,
    /// Operator's stated reason for an admin override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: Timestamp,
}

impl AuditRecord {
    /// A mutation that was applied.
    pub fn applied(
        actor: Actor,
        action: impl Into<String>,
        before: Option<&Subscription>,
        after: &Subscription,
        at: Timestamp,
    ) -> Self {
        Self {
            id: AuditRecordId::new(),
            actor: Some(actor),
            action: action.into(),
            target_subscription_id: Some(after.id),
            before_state: before.and_then(snapshot),
            after_state: snapshot(after),
            success: true,
            error_detail: None,
            reason: None,
            timestamp: at,
        }
    }

    /// A mutation rejected by a business rule or an authenticity check.
    pub fn rejected(
        actor: Actor,
        action: impl Into<String>,
        target: Option<&Subscription>,
        error: impl Into<String>,
        at: Timestamp,
    ) -> Self {
        Self {
            id: AuditRecordId::new(),
            actor: Some(actor),
            action: action.into(),
            target_subscription_id: target.map(|s| s.id),
            before_state: target.and_then(snapshot),
            after_state: None,
            success: false,
            error_detail: Some(error.into()),
            reason: None,
            timestamp: at,
        }
    }
}

impl AuditRecord {
    pub fn with_reason(mut self, reason: Option<&str>) -> Self {
        self.reason = reason.map(str::to_string);
        self
    }
}

fn snapshot(subscription: &Subscription) -> Option<serde_json::Value> {
    serde_json::to_value(subscription).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::PlanCatalog;

    fn subscription() -> Subscription {
        let catalog = PlanCatalog::standard();
        Subscription::create(
            SubscriptionId::new(),
            UserId::new("7").unwrap(),
            catalog.get_plan("premium").unwrap(),
            14,
            Timestamp::from_unix_secs(1_700_000_000).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn actor_ids_round_trip() {
        for actor in [
            Actor::User(UserId::new("7").unwrap()),
            Actor::Admin(UserId::new("ops-1").unwrap()),
            Actor::Webhook,
            Actor::Sweeper,
        ] {
            assert_eq!(Actor::from_id(&actor.as_id()), Some(actor.clone()));
        }
        assert_eq!(Actor::from_id(""), None);
        assert_eq!(Actor::from_id("admin:"), None);
    }

    #[test]
    fn admin_actor_is_distinct_from_same_user() {
        let id = UserId::new("7").unwrap();
        assert_eq!(Actor::Admin(id.clone()).as_id(), "admin:7");
        assert_ne!(Actor::Admin(id.clone()).as_id(), Actor::User(id).as_id());
    }

    #[test]
    fn reason_is_attached_on_request() {
        let record = AuditRecord::applied(
            Actor::Admin(UserId::new("ops-1").unwrap()),
            "admin_cancel",
            None,
            &subscription(),
            Timestamp::now(),
        )
        .with_reason(Some("chargeback"));
        assert_eq!(record.reason.as_deref(), Some("chargeback"));
    }

    #[test]
    fn applied_record_snapshots_both_states() {
        let before = subscription();
        let mut after = before.clone();
        after
            .schedule_cancellation(before.updated_at.add_days(1))
            .unwrap();

        let record = AuditRecord::applied(
            Actor::User(before.user_id.clone()),
            "cancel",
            Some(&before),
            &after,
            after.updated_at,
        );

        assert!(record.success);
        assert_eq!(record.target_subscription_id, Some(before.id));
        assert_eq!(record.before_state.unwrap()["cancel_at_period_end"], false);
        assert_eq!(record.after_state.unwrap()["cancel_at_period_end"], true);
    }

    #[test]
    fn rejected_record_carries_error_detail() {
        let record = AuditRecord::rejected(
            Actor::Webhook,
            "verify_signature",
            None,
            "signature_mismatch",
            Timestamp::now(),
        );
        assert!(!record.success);
        assert_eq!(record.target_subscription_id, None);
        assert_eq!(record.error_detail.as_deref(), Some("signature_mismatch"));
        assert_eq!(record.actor.unwrap().as_id(), "webhook");
    }
}
