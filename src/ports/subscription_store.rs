//! Subscription store port.
//!
//! Transactional storage for subscription rows with compare-and-swap updates.
//!
//! # Guarantees implementations must provide
//!
//! - At most one row per user with status other than `canceled`; a second
//!   live insert returns `InsertResult::LiveSubscriptionExists`
//! - `update` writes only if the stored `version` equals `expected_version`
//! - The trial notice claim is a single guarded write on `trial_notified_at`
//! - Sweep scans are keyset-paginated on `id` ascending

use async_trait::async_trait;
use std::collections::HashMap;

use crate::domain::catalog::PlanId;
use crate::domain::foundation::{DomainError, SubscriptionId, Timestamp, UserId};
use crate::domain::subscription::{Subscription, SubscriptionStatus};

/// Result of inserting a new subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    Inserted,
    /// The user already owns a live subscription.
    LiveSubscriptionExists,
}

/// Result of a version-guarded update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateResult {
    Updated,
    /// The row changed (or vanished) since it was read.
    VersionMismatch,
    /// The write would leave the user with two live rows.
    LiveSubscriptionExists,
}

/// Filter for admin listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub status: Option<SubscriptionStatus>,
    pub plan_id: Option<PlanId>,
}

impl SubscriptionFilter {
    pub fn matches(&self, subscription: &Subscription) -> bool {
        self.status.map_or(true, |s| subscription.status == s)
            && self
                .plan_id
                .as_ref()
                .map_or(true, |p| &subscription.plan_id == p)
    }
}

/// One page of a listing plus the total match count.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionPage {
    pub items: Vec<Subscription>,
    pub total: u64,
}

/// Keyset cursor for sweep scans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanCursor {
    /// Return rows with id strictly greater than this.
    pub after: Option<SubscriptionId>,
    pub limit: u32,
}

impl ScanCursor {
    pub fn first(limit: u32) -> Self {
        Self { after: None, limit }
    }

    pub fn after(self, id: SubscriptionId) -> Self {
        Self {
            after: Some(id),
            ..self
        }
    }
}

/// Row counts grouped by status and plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionCounts {
    pub by_status_and_plan: HashMap<(SubscriptionStatus, PlanId), u64>,
}

impl SubscriptionCounts {
    pub fn add(&mut self, status: SubscriptionStatus, plan_id: PlanId, count: u64) {
        *self
            .by_status_and_plan
            .entry((status, plan_id))
            .or_insert(0) += count;
    }
}

/// Storage port for subscription rows.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Insert a new row.
    async fn insert(&self, subscription: &Subscription) -> Result<InsertResult, DomainError>;

    /// Replace a row if its stored version is still `expected_version`.
    async fn update(
        &self,
        subscription: &Subscription,
        expected_version: u64,
    ) -> Result<UpdateResult, DomainError>;

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError>;

    /// The user's non-canceled row, if any.
    async fn find_live_for_user(&self, user_id: &UserId)
        -> Result<Option<Subscription>, DomainError>;

    /// The user's most recently created row regardless of status.
    async fn find_latest_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError>;

    async fn find_by_external_subscription_ref(
        &self,
        external_ref: &str,
    ) -> Result<Option<Subscription>, DomainError>;

    /// Newest first.
    async fn list(
        &self,
        filter: &SubscriptionFilter,
        limit: u32,
        offset: u32,
    ) -> Result<SubscriptionPage, DomainError>;

    async fn counts(&self) -> Result<SubscriptionCounts, DomainError>;

    /// Trialing rows whose trial ends in `[from, until]` and whose notice is unclaimed.
    async fn find_trials_expiring(
        &self,
        from: Timestamp,
        until: Timestamp,
        cursor: ScanCursor,
    ) -> Result<Vec<Subscription>, DomainError>;

    /// Trialing rows whose trial ended at or before `now`.
    async fn find_expired_trials(
        &self,
        now: Timestamp,
        cursor: ScanCursor,
    ) -> Result<Vec<Subscription>, DomainError>;

    /// Active rows flagged to cancel whose period ended at or before `now`.
    async fn find_pending_cancellations(
        &self,
        now: Timestamp,
        cursor: ScanCursor,
    ) -> Result<Vec<Subscription>, DomainError>;

    /// Sets `trial_notified_at = at` only if it is currently unset.
    ///
    /// Returns true if this caller won the claim.
    async fn claim_trial_notification(
        &self,
        id: &SubscriptionId,
        at: Timestamp,
    ) -> Result<bool, DomainError>;

    /// Clears a claim, only if it still holds the value `claimed_at`.
    async fn release_trial_notification(
        &self,
        id: &SubscriptionId,
        claimed_at: Timestamp,
    ) -> Result<bool, DomainError>;
}
