//! Shared fixtures for application tests.

use std::sync::Arc;

use super::audit_recorder::AuditRecorder;
use super::ledger::LedgerContext;
use crate::adapters::clock::FixedClock;
use crate::adapters::memory::{InMemoryAuditLog, InMemorySubscriptionStore};
use crate::domain::catalog::PlanCatalog;
use crate::domain::foundation::{SubscriptionId, Timestamp, UserId};
use crate::domain::subscription::Subscription;
use crate::ports::SubscriptionStore;

pub(crate) fn t0() -> Timestamp {
    Timestamp::from_unix_secs(1_700_000_000).unwrap()
}

pub(crate) fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

/// In-memory ports wired into a ledger context, with a clock at `t0`.
pub(crate) struct Harness {
    pub ctx: LedgerContext,
    pub store: Arc<InMemorySubscriptionStore>,
    pub audit: Arc<InMemoryAuditLog>,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let audit = Arc::new(InMemoryAuditLog::new());
        let clock = Arc::new(FixedClock::new(t0()));
        let ctx = LedgerContext::new(
            store.clone(),
            AuditRecorder::new(audit.clone()),
            Arc::new(PlanCatalog::standard()),
            clock.clone(),
        );
        Self {
            ctx,
            store,
            audit,
            clock,
        }
    }

    /// Inserts a row created at the current clock time.
    pub async fn seed(&self, user_id: &str, plan_id: &str, trial_days: u32) -> Subscription {
        let sub = Subscription::create(
            SubscriptionId::new(),
            user(user_id),
            self.ctx.catalog().get_plan(plan_id).unwrap(),
            trial_days,
            self.ctx.now(),
        )
        .unwrap();
        self.store.insert(&sub).await.unwrap();
        sub
    }

    pub async fn stored(&self, id: &SubscriptionId) -> Subscription {
        self.store.find_by_id(id).await.unwrap().unwrap()
    }
}
