//! Subscription aggregate entity.
//!
//! A subscription is the billing state of one user on one plan. A user may
//! own many rows over time, but at most one that is not canceled.
//!
//! Every mutating method takes the logical time of the change and advances
//! `updated_at` strictly, then bumps `version` so the store can guard the
//! write with a compare-and-swap.

use crate::domain::catalog::{Plan, PlanId};
use crate::domain::foundation::{StateMachine, SubscriptionId, Timestamp, UserId, ValidationError};
use serde::{Deserialize, Serialize};

use super::{
    ExternalRefs, LedgerError, SubscriptionStatus, TransitionEffect, TransitionKind,
    TransitionOutcome,
};

/// Longest trial a subscription may start with.
pub const MAX_TRIAL_DAYS: u32 = 365;

/// Subscription aggregate.
///
/// # Invariants
///
/// - `is_trialing` implies `status == Trialing` and `trial_end` is set
/// - `cancel_at_period_end` implies `status` is `Active` or `Trialing`
/// - `updated_at` never moves backwards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub status: SubscriptionStatus,
    pub plan_id: PlanId,

    pub external_customer_ref: Option<String>,
    pub external_subscription_ref: Option<String>,
    pub external_price_ref: Option<String>,

    pub current_period_start: Timestamp,
    pub current_period_end: Timestamp,
    pub cancel_at_period_end: bool,

    pub trial_start: Option<Timestamp>,
    pub trial_end: Option<Timestamp>,
    pub trial_days: u32,
    pub is_trialing: bool,
    /// Set once the trial-expiring notice has been claimed for sending.
    pub trial_notified_at: Option<Timestamp>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub canceled_at: Option<Timestamp>,

    /// Optimistic concurrency token.
    pub version: u64,
}

impl Subscription {
    /// Starts a subscription, trialing when `trial_days > 0`.
    pub fn create(
        id: SubscriptionId,
        user_id: UserId,
        plan: &Plan,
        trial_days: u32,
        now: Timestamp,
    ) -> Result<Self, LedgerError> {
        if trial_days > MAX_TRIAL_DAYS {
            return Err(ValidationError::out_of_range(
                "trial_days",
                0,
                i64::from(MAX_TRIAL_DAYS),
                i64::from(trial_days),
            )
            .into());
        }

        let trialing = trial_days > 0;
        let (status, period_end, trial_start, trial_end) = if trialing {
            let trial_end = now.add_days(i64::from(trial_days));
            (SubscriptionStatus::Trialing, trial_end, Some(now), Some(trial_end))
        } else {
            (
                SubscriptionStatus::Active,
                plan.interval.period_end_from(now),
                None,
                None,
            )
        };

        Ok(Self {
            id,
            user_id,
            status,
            plan_id: plan.id.clone(),
            external_customer_ref: None,
            external_subscription_ref: None,
            external_price_ref: None,
            current_period_start: now,
            current_period_end: period_end,
            cancel_at_period_end: false,
            trial_start,
            trial_end,
            trial_days,
            is_trialing: trialing,
            trial_notified_at: None,
            created_at: now,
            updated_at: now,
            canceled_at: None,
            version: 0,
        })
    }

    /// Moves to `plan` and restarts the billing period at `now`.
    ///
    /// Direction is checked by the caller against the catalog.
    pub fn change_plan(&mut self, plan: &Plan, now: Timestamp) -> Result<(), LedgerError> {
        if self.status == SubscriptionStatus::Canceled {
            return Err(LedgerError::invalid_transition(self.status, "change plan of"));
        }
        self.plan_id = plan.id.clone();
        self.current_period_start = now;
        self.current_period_end = plan.interval.period_end_from(now);
        self.touch(now);
        Ok(())
    }

    /// Flags the subscription to end when the current period does.
    pub fn schedule_cancellation(&mut self, now: Timestamp) -> Result<(), LedgerError> {
        if !self.status.allows_pending_cancel() {
            return Err(LedgerError::invalid_transition(self.status, "schedule cancellation of"));
        }
        self.cancel_at_period_end = true;
        self.touch(now);
        Ok(())
    }

    /// Ends the subscription at `at`.
    pub fn cancel_immediately(&mut self, at: Timestamp) -> Result<(), LedgerError> {
        if self.status == SubscriptionStatus::Canceled {
            return Err(LedgerError::invalid_transition(self.status, "cancel"));
        }
        self.transition_to(SubscriptionStatus::Canceled, "cancel")?;
        self.cancel_at_period_end = false;
        self.is_trialing = false;
        if self.current_period_end > at {
            self.current_period_end = at;
        }
        self.canceled_at = Some(at);
        self.touch(at);
        Ok(())
    }

    /// Undoes a cancellation, pending or completed.
    ///
    /// A canceled row whose period has elapsed restarts with a fresh period.
    pub fn reactivate(&mut self, plan: &Plan, now: Timestamp) -> Result<(), LedgerError> {
        match self.status {
            SubscriptionStatus::Canceled => {
                self.transition_to(SubscriptionStatus::Active, "reactivate")?;
                self.canceled_at = None;
                if self.current_period_end <= now {
                    self.current_period_start = now;
                    self.current_period_end = plan.interval.period_end_from(now);
                }
            }
            SubscriptionStatus::Active if self.cancel_at_period_end => {}
            status => return Err(LedgerError::NothingToReactivate { status }),
        }
        self.cancel_at_period_end = false;
        self.touch(now);
        Ok(())
    }

    /// Links provider identifiers; fields absent from `refs` are left alone.
    pub fn attach_external_refs(&mut self, refs: &ExternalRefs, now: Timestamp) {
        self.merge_refs(refs);
        self.touch(now);
    }

    /// Whether `refs` would change nothing.
    pub fn has_refs(&self, refs: &ExternalRefs) -> bool {
        fn same(current: &Option<String>, incoming: &Option<String>) -> bool {
            incoming.is_none() || incoming == current
        }
        same(&self.external_customer_ref, &refs.customer)
            && same(&self.external_subscription_ref, &refs.subscription)
            && same(&self.external_price_ref, &refs.price)
    }

    /// Applies a provider- or schedule-driven transition.
    ///
    /// Order of checks: already-in-target-state is a no-op, then stale events
    /// are rejected, then nothing leaves `Canceled` through this path.
    pub fn apply_external(
        &mut self,
        kind: TransitionKind,
        effect: &TransitionEffect,
        plan: &Plan,
        now: Timestamp,
    ) -> Result<TransitionOutcome, LedgerError> {
        if self.is_in_target_state(kind, effect) {
            return Ok(TransitionOutcome::NoOp);
        }

        if effect.occurred_at < self.updated_at {
            return Err(LedgerError::StaleEvent {
                occurred_at: effect.occurred_at,
                updated_at: self.updated_at,
            });
        }

        if self.status == SubscriptionStatus::Canceled {
            return Err(LedgerError::invalid_transition(self.status, kind.as_str()));
        }

        match kind {
            TransitionKind::Activate => {
                self.transition_to(SubscriptionStatus::Active, kind.as_str())?;
                self.is_trialing = false;
                let (start, end) = effect
                    .period()
                    .unwrap_or_else(|| (now, plan.interval.period_end_from(now)));
                self.current_period_start = start;
                self.current_period_end = end;
                self.merge_refs(&effect.refs);
                if let Some(flag) = effect.cancel_at_period_end {
                    self.cancel_at_period_end = flag;
                }
            }
            TransitionKind::RenewPeriod => {
                self.transition_to(SubscriptionStatus::Active, kind.as_str())?;
                self.is_trialing = false;
                let (start, end) = effect.period().unwrap_or_else(|| {
                    let start = std::cmp::max(now, self.current_period_end);
                    (start, plan.interval.period_end_from(start))
                });
                self.current_period_start = start;
                self.current_period_end = end;
                self.merge_refs(&effect.refs);
            }
            TransitionKind::MarkPastDue => {
                self.transition_to(SubscriptionStatus::PastDue, kind.as_str())?;
                self.is_trialing = false;
                self.cancel_at_period_end = false;
            }
            TransitionKind::Cancel => {
                self.transition_to(SubscriptionStatus::Canceled, kind.as_str())?;
                self.cancel_at_period_end = false;
                self.is_trialing = false;
                if self.current_period_end > effect.occurred_at {
                    self.current_period_end = effect.occurred_at;
                }
                self.canceled_at = Some(effect.occurred_at);
            }
            TransitionKind::SyncFromProvider => {
                if let Some((start, end)) = effect.period() {
                    self.current_period_start = start;
                    self.current_period_end = end;
                }
                if let Some(flag) = effect.cancel_at_period_end {
                    self.cancel_at_period_end = flag && self.status.allows_pending_cancel();
                }
                self.merge_refs(&effect.refs);
            }
        }

        self.touch(effect.occurred_at);
        Ok(TransitionOutcome::Applied)
    }

    /// Trial end is inside `[from, until]` and nobody has claimed the notice yet.
    pub fn trial_expiring_within(&self, from: Timestamp, until: Timestamp) -> bool {
        self.status == SubscriptionStatus::Trialing
            && self.is_trialing
            && self.trial_notified_at.is_none()
            && self
                .trial_end
                .map(|end| end >= from && end <= until)
                .unwrap_or(false)
    }

    /// Trialing with the trial window already over.
    pub fn trial_expired_at(&self, now: Timestamp) -> bool {
        self.status == SubscriptionStatus::Trialing
            && self.trial_end.map(|end| end <= now).unwrap_or(false)
    }

    /// Active, flagged for cancellation, and the period has ended.
    pub fn pending_cancel_due_at(&self, now: Timestamp) -> bool {
        self.status == SubscriptionStatus::Active
            && self.cancel_at_period_end
            && self.current_period_end <= now
    }

    // Private helpers

    fn is_in_target_state(&self, kind: TransitionKind, effect: &TransitionEffect) -> bool {
        let period_matches = effect
            .period()
            .map(|(start, end)| start == self.current_period_start && end == self.current_period_end);
        let flag_matches = effect
            .cancel_at_period_end
            .map(|flag| flag == self.cancel_at_period_end)
            .unwrap_or(true);

        match kind {
            TransitionKind::Activate => {
                self.status == SubscriptionStatus::Active
                    && !self.is_trialing
                    && self.has_refs(&effect.refs)
                    && period_matches.unwrap_or(true)
                    && flag_matches
            }
            // Without a period, an active row already touched at or after the
            // event has seen this renewal.
            TransitionKind::RenewPeriod => {
                self.status == SubscriptionStatus::Active
                    && period_matches.unwrap_or(effect.occurred_at <= self.updated_at)
                    && self.has_refs(&effect.refs)
            }
            TransitionKind::MarkPastDue => self.status == SubscriptionStatus::PastDue,
            TransitionKind::Cancel => self.status == SubscriptionStatus::Canceled,
            TransitionKind::SyncFromProvider => {
                period_matches.unwrap_or(true) && flag_matches && self.has_refs(&effect.refs)
            }
        }
    }

    fn merge_refs(&mut self, refs: &ExternalRefs) {
        if let Some(customer) = &refs.customer {
            self.external_customer_ref = Some(customer.clone());
        }
        if let Some(subscription) = &refs.subscription {
            self.external_subscription_ref = Some(subscription.clone());
        }
        if let Some(price) = &refs.price {
            self.external_price_ref = Some(price.clone());
        }
    }

    fn transition_to(
        &mut self,
        target: SubscriptionStatus,
        action: &str,
    ) -> Result<(), LedgerError> {
        self.status = self
            .status
            .transition_to(target)
            .map_err(|_| LedgerError::invalid_transition(self.status, action))?;
        Ok(())
    }

    fn touch(&mut self, at: Timestamp) {
        self.updated_at = if at > self.updated_at {
            at
        } else {
            self.updated_at.next_tick()
        };
        self.version += 1;
    }
}
