//! ProcessedEventStore port - record of every provider event handled.
//!
//! The provider delivers at least once and may retry after we already
//! answered. A delivery claims its `external_event_id` before touching the
//! ledger; the unique key on that id is the only thing that makes concurrent
//! deliveries of the same event safe.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{DomainError, SubscriptionId, Timestamp, ValidationError};

/// Outcome of handling one provider event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventOutcome {
    /// Claimed by a delivery that has not finished yet.
    Processing,
    Applied,
    DuplicateSkipped,
    Rejected,
}

impl EventOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventOutcome::Processing => "processing",
            EventOutcome::Applied => "applied",
            EventOutcome::DuplicateSkipped => "duplicate-skipped",
            EventOutcome::Rejected => "rejected",
        }
    }
}

impl fmt::Display for EventOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventOutcome {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(EventOutcome::Processing),
            "applied" => Ok(EventOutcome::Applied),
            "duplicate-skipped" => Ok(EventOutcome::DuplicateSkipped),
            "rejected" => Ok(EventOutcome::Rejected),
            other => Err(ValidationError::invalid_format(
                "outcome",
                format!("unknown event outcome '{}'", other),
            )),
        }
    }
}

/// Record of a claimed or handled provider event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedEvent {
    pub external_event_id: String,
    pub event_type: String,
    pub subscription_id: Option<SubscriptionId>,
    pub received_at: Timestamp,
    pub outcome: EventOutcome,
    pub note: Option<String>,
}

impl ProcessedEvent {
    pub fn new(
        external_event_id: impl Into<String>,
        event_type: impl Into<String>,
        outcome: EventOutcome,
        received_at: Timestamp,
    ) -> Self {
        Self {
            external_event_id: external_event_id.into(),
            event_type: event_type.into(),
            subscription_id: None,
            received_at,
            outcome,
            note: None,
        }
    }

    pub fn for_subscription(mut self, id: Option<SubscriptionId>) -> Self {
        self.subscription_id = id;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn is_finished(&self) -> bool {
        self.outcome != EventOutcome::Processing
    }
}

/// Result of claiming an event id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimResult {
    /// This delivery owns the event id.
    Claimed,
    /// Another delivery claimed or finished this event first.
    AlreadyClaimed,
}

/// Port for the processed-event log.
///
/// Implementations must enforce uniqueness of `external_event_id` in storage
/// (primary key + conditional insert), not by read-then-write.
#[async_trait]
pub trait ProcessedEventStore: Send + Sync {
    async fn find(&self, external_event_id: &str) -> Result<Option<ProcessedEvent>, DomainError>;

    /// Inserts `event` as a `processing` claim unless its id is already
    /// recorded. An unfinished claim received before `stale_before` is taken
    /// over; a finished record never is.
    async fn claim(
        &self,
        event: &ProcessedEvent,
        stale_before: Timestamp,
    ) -> Result<ClaimResult, DomainError>;

    /// Stores the terminal outcome, subscription and note on a claim.
    async fn complete(&self, event: &ProcessedEvent) -> Result<(), DomainError>;

    /// Drops an unfinished claim so a redelivery can take it.
    async fn release(&self, external_event_id: &str) -> Result<(), DomainError>;

    /// Deletes records received before `cutoff`; returns how many went.
    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, DomainError>;
}
