//! Subscription domain.
//!
//! # Module Structure
//!
//! - `aggregate` - Subscription entity and its lifecycle methods
//! - `status` - SubscriptionStatus state machine
//! - `transition` - external transition kinds, effects, plan change direction
//! - `errors` - LedgerError taxonomy

mod aggregate;
mod errors;
mod status;
mod transition;

pub use aggregate::{Subscription, MAX_TRIAL_DAYS};
pub use errors::LedgerError;
pub use status::SubscriptionStatus;
pub use transition::{
    ExternalRefs, PlanChangeDirection, TransitionEffect, TransitionKind, TransitionOutcome,
};
