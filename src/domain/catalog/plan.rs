//! Plan definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::domain::foundation::{Timestamp, ValidationError};

/// Catalog key of a plan, e.g. `premium`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(pub(super) String);

impl PlanId {
    /// Creates a new PlanId, returning error if empty.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::empty_field("plan_id"));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How often a plan bills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingInterval {
    Month,
    Year,
}

impl BillingInterval {
    /// Returns the end of a period that starts at `start`.
    pub fn period_end_from(&self, start: Timestamp) -> Timestamp {
        match self {
            BillingInterval::Month => start.add_months(1),
            BillingInterval::Year => start.add_months(12),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Month => "month",
            BillingInterval::Year => "year",
        }
    }
}

impl fmt::Display for BillingInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub display_name: String,
    /// Price in minor currency units (cents).
    pub price_minor_units: u64,
    pub interval: BillingInterval,
    pub features: BTreeSet<String>,
    /// Provider-side price identifier, if the plan is sold through the provider.
    pub external_price_ref: Option<String>,
}

impl Plan {
    pub fn new(
        id: PlanId,
        display_name: impl Into<String>,
        price_minor_units: u64,
        interval: BillingInterval,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            price_minor_units,
            interval,
            features: BTreeSet::new(),
            external_price_ref: None,
        }
    }

    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features.extend(features.into_iter().map(Into::into));
        self
    }

    pub fn with_external_price_ref(mut self, price_ref: impl Into<String>) -> Self {
        self.external_price_ref = Some(price_ref.into());
        self
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }

    pub fn is_paid(&self) -> bool {
        self.price_minor_units > 0
    }

    /// Normalized monthly revenue contribution; yearly plans spread over 12 months.
    pub fn monthly_price_minor_units(&self) -> u64 {
        match self.interval {
            BillingInterval::Month => self.price_minor_units,
            BillingInterval::Year => self.price_minor_units / 12,
        }
    }
}
