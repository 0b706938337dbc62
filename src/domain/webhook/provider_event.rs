//! Provider webhook event types.
//!
//! Only fields the reconciler uses are captured; everything else in the
//! provider's payload is ignored.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::foundation::Timestamp;

/// Webhook event envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderEvent {
    /// Unique identifier for the event (`evt_...`).
    pub id: String,

    /// Type of event, e.g. `invoice.payment_succeeded`.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix timestamp of event creation on the provider side.
    pub created: i64,

    pub data: ProviderEventData,

    #[serde(default)]
    pub livemode: bool,

    #[serde(default)]
    pub api_version: Option<String>,
}

/// Container for event-specific data.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderEventData {
    /// The object that triggered the event; shape depends on the event type.
    pub object: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_attributes: Option<serde_json::Value>,
}

impl ProviderEvent {
    pub fn kind(&self) -> ProviderEventKind {
        ProviderEventKind::parse(&self.event_type)
    }

    /// Creation time as a timestamp; `None` for out-of-range values.
    pub fn occurred_at(&self) -> Option<Timestamp> {
        Timestamp::from_unix_secs(self.created)
    }

    /// Attempts to deserialize the data object as the specified type.
    pub fn deserialize_object<T: serde::de::DeserializeOwned>(
        &self,
    ) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.object.clone())
    }
}

/// Closed set of event kinds the reconciler understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderEventKind {
    CheckoutSessionCompleted,
    InvoicePaymentSucceeded,
    InvoicePaymentFailed,
    CustomerSubscriptionUpdated,
    CustomerSubscriptionDeleted,
    CustomerSubscriptionTrialWillEnd,
    Unknown,
}

impl ProviderEventKind {
    pub fn parse(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "invoice.payment_succeeded" => Self::InvoicePaymentSucceeded,
            "invoice.payment_failed" => Self::InvoicePaymentFailed,
            "customer.subscription.updated" => Self::CustomerSubscriptionUpdated,
            "customer.subscription.deleted" => Self::CustomerSubscriptionDeleted,
            "customer.subscription.trial_will_end" => Self::CustomerSubscriptionTrialWillEnd,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::InvoicePaymentSucceeded => "invoice.payment_succeeded",
            Self::InvoicePaymentFailed => "invoice.payment_failed",
            Self::CustomerSubscriptionUpdated => "customer.subscription.updated",
            Self::CustomerSubscriptionDeleted => "customer.subscription.deleted",
            Self::CustomerSubscriptionTrialWillEnd => "customer.subscription.trial_will_end",
            Self::Unknown => "unknown",
        }
    }
}

/// `checkout.session` object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub mode: Option<String>,
    /// Local subscription id set when the session was created.
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    pub fn is_subscription_mode(&self) -> bool {
        self.mode.as_deref() == Some("subscription")
    }

    /// Local subscription id, from the reference id or metadata.
    pub fn local_subscription_ref(&self) -> Option<&str> {
        self.client_reference_id
            .as_deref()
            .or_else(|| self.metadata.get("subscription_id").map(String::as_str))
            .filter(|s| !s.is_empty())
    }
}

/// `invoice` object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Invoice {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub period_start: Option<i64>,
    #[serde(default)]
    pub period_end: Option<i64>,
    #[serde(default)]
    pub lines: InvoiceLines,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceLines {
    #[serde(default)]
    pub data: Vec<InvoiceLine>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceLine {
    #[serde(default)]
    pub period: Option<LinePeriod>,
    #[serde(default)]
    pub price: Option<PriceRef>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct LinePeriod {
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PriceRef {
    pub id: String,
}

impl Invoice {
    /// Billed period, preferring the first line item over the invoice header.
    pub fn billed_period(&self) -> (Option<Timestamp>, Option<Timestamp>) {
        let line_period = self.lines.data.iter().find_map(|line| line.period);
        let (start, end) = match line_period {
            Some(period) => (Some(period.start), Some(period.end)),
            None => (self.period_start, self.period_end),
        };
        (
            start.and_then(Timestamp::from_unix_secs),
            end.and_then(Timestamp::from_unix_secs),
        )
    }

    pub fn price_ref(&self) -> Option<&str> {
        self.lines
            .data
            .iter()
            .find_map(|line| line.price.as_ref())
            .map(|price| price.id.as_str())
    }
}

/// `subscription` object as sent with `customer.subscription.*` events.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderSubscription {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub cancel_at_period_end: Option<bool>,
    #[serde(default)]
    pub current_period_start: Option<i64>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ProviderSubscription {
    pub fn period(&self) -> (Option<Timestamp>, Option<Timestamp>) {
        (
            self.current_period_start.and_then(Timestamp::from_unix_secs),
            self.current_period_end.and_then(Timestamp::from_unix_secs),
        )
    }

    pub fn local_subscription_ref(&self) -> Option<&str> {
        self.metadata
            .get("subscription_id")
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }
}
