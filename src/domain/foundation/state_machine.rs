//! State machine trait for status enums.

use super::ValidationError;

/// Status enums that form a closed transition graph.
///
/// Implementors list the legal edges; `transition_to` validates against them.
///
/// ```ignore
/// let next = SubscriptionStatus::Trialing.transition_to(SubscriptionStatus::Active)?;
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "status",
                format!("cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }
}
