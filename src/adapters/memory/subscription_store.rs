//! In-memory implementation of SubscriptionStore.
//!
//! Holds rows behind a tokio `RwLock`; every guarded write (insert, CAS
//! update, trial claim) runs under the write lock, so the same invariants
//! the database enforces with indexes and conditional updates hold here.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, SubscriptionId, Timestamp, UserId};
use crate::domain::subscription::Subscription;
use crate::ports::{
    InsertResult, ScanCursor, SubscriptionCounts, SubscriptionFilter, SubscriptionPage,
    SubscriptionStore, UpdateResult,
};

/// Subscription rows keyed by id; `BTreeMap` keeps keyset scans ordered.
#[derive(Default)]
pub struct InMemorySubscriptionStore {
    rows: RwLock<BTreeMap<SubscriptionId, Subscription>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows, any status.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    async fn scan<F>(&self, cursor: ScanCursor, predicate: F) -> Vec<Subscription>
    where
        F: Fn(&Subscription) -> bool,
    {
        let rows = self.rows.read().await;
        let lower = match cursor.after {
            Some(after) => std::ops::Bound::Excluded(after),
            None => std::ops::Bound::Unbounded,
        };
        rows.range((lower, std::ops::Bound::Unbounded))
            .map(|(_, sub)| sub)
            .filter(|sub| predicate(sub))
            .take(cursor.limit as usize)
            .cloned()
            .collect()
    }
}

fn owns_other_live_row(
    rows: &BTreeMap<SubscriptionId, Subscription>,
    user_id: &UserId,
    except: &SubscriptionId,
) -> bool {
    rows.values()
        .any(|s| &s.user_id == user_id && &s.id != except && s.status.is_live())
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn insert(&self, subscription: &Subscription) -> Result<InsertResult, DomainError> {
        let mut rows = self.rows.write().await;

        if rows.contains_key(&subscription.id) {
            return Err(DomainError::database(format!(
                "duplicate subscription id {}",
                subscription.id
            )));
        }
        if subscription.status.is_live()
            && owns_other_live_row(&rows, &subscription.user_id, &subscription.id)
        {
            return Ok(InsertResult::LiveSubscriptionExists);
        }

        rows.insert(subscription.id, subscription.clone());
        Ok(InsertResult::Inserted)
    }

    async fn update(
        &self,
        subscription: &Subscription,
        expected_version: u64,
    ) -> Result<UpdateResult, DomainError> {
        let mut rows = self.rows.write().await;

        let current_version = match rows.get(&subscription.id) {
            Some(current) => current.version,
            None => return Ok(UpdateResult::VersionMismatch),
        };
        if current_version != expected_version {
            return Ok(UpdateResult::VersionMismatch);
        }
        if subscription.status.is_live()
            && owns_other_live_row(&rows, &subscription.user_id, &subscription.id)
        {
            return Ok(UpdateResult::LiveSubscriptionExists);
        }

        rows.insert(subscription.id, subscription.clone());
        Ok(UpdateResult::Updated)
    }

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        Ok(self.rows.read().await.get(id).cloned())
    }

    async fn find_live_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|s| &s.user_id == user_id && s.status.is_live())
            .cloned())
    }

    async fn find_latest_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|s| &s.user_id == user_id)
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn find_by_external_subscription_ref(
        &self,
        external_ref: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|s| s.external_subscription_ref.as_deref() == Some(external_ref))
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn list(
        &self,
        filter: &SubscriptionFilter,
        limit: u32,
        offset: u32,
    ) -> Result<SubscriptionPage, DomainError> {
        let rows = self.rows.read().await;
        let mut matching: Vec<&Subscription> = rows.values().filter(|s| filter.matches(s)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(SubscriptionPage {
            total: matching.len() as u64,
            items: matching
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .cloned()
                .collect(),
        })
    }

    async fn counts(&self) -> Result<SubscriptionCounts, DomainError> {
        let mut counts = SubscriptionCounts::default();
        for sub in self.rows.read().await.values() {
            counts.add(sub.status, sub.plan_id.clone(), 1);
        }
        Ok(counts)
    }

    async fn find_trials_expiring(
        &self,
        from: Timestamp,
        until: Timestamp,
        cursor: ScanCursor,
    ) -> Result<Vec<Subscription>, DomainError> {
        Ok(self
            .scan(cursor, |s| s.trial_expiring_within(from, until))
            .await)
    }

    async fn find_expired_trials(
        &self,
        now: Timestamp,
        cursor: ScanCursor,
    ) -> Result<Vec<Subscription>, DomainError> {
        Ok(self.scan(cursor, |s| s.trial_expired_at(now)).await)
    }

    async fn find_pending_cancellations(
        &self,
        now: Timestamp,
        cursor: ScanCursor,
    ) -> Result<Vec<Subscription>, DomainError> {
        Ok(self.scan(cursor, |s| s.pending_cancel_due_at(now)).await)
    }

    async fn claim_trial_notification(
        &self,
        id: &SubscriptionId,
        at: Timestamp,
    ) -> Result<bool, DomainError> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(id) {
            Some(sub) if sub.trial_notified_at.is_none() => {
                sub.trial_notified_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_trial_notification(
        &self,
        id: &SubscriptionId,
        claimed_at: Timestamp,
    ) -> Result<bool, DomainError> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(id) {
            Some(sub) if sub.trial_notified_at == Some(claimed_at) => {
                sub.trial_notified_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
