//! Ledger context shared by every subscription operation.
//!
//! Holds the ports and settings a mutation needs and implements the one
//! read-modify-write loop all of them go through:
//!
//! 1. Read the row and its `version`
//! 2. Apply the change to a copy
//! 3. Write it back guarded by "still at that version"
//! 4. On a version mismatch, start over, up to `max_retries` extra attempts
//!
//! Every store call is bounded by `store_timeout`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::audit_recorder::AuditRecorder;
use crate::config::LedgerConfig;
use crate::domain::audit::{Actor, AuditRecord};
use crate::domain::catalog::PlanCatalog;
use crate::domain::foundation::{DomainError, SubscriptionId, Timestamp};
use crate::domain::subscription::{LedgerError, Subscription, TransitionOutcome};
use crate::ports::{Clock, SubscriptionStore, UpdateResult};

/// Retry budget and store deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSettings {
    pub max_retries: u32,
    pub store_timeout: Duration,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            store_timeout: Duration::from_millis(5000),
        }
    }
}

impl From<&LedgerConfig> for LedgerSettings {
    fn from(config: &LedgerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            store_timeout: config.store_timeout(),
        }
    }
}

/// Result of a guarded mutation.
#[derive(Debug, Clone)]
pub struct Mutation {
    /// The row as stored after the operation.
    pub subscription: Subscription,
    pub outcome: TransitionOutcome,
}

/// Explicit context passed to every handler; no global state.
#[derive(Clone)]
pub struct LedgerContext {
    store: Arc<dyn SubscriptionStore>,
    audit: AuditRecorder,
    catalog: Arc<PlanCatalog>,
    clock: Arc<dyn Clock>,
    settings: LedgerSettings,
}

impl LedgerContext {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        audit: AuditRecorder,
        catalog: Arc<PlanCatalog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            audit,
            catalog,
            clock,
            settings: LedgerSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: LedgerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn store(&self) -> &dyn SubscriptionStore {
        self.store.as_ref()
    }

    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    pub fn audit(&self) -> &AuditRecorder {
        &self.audit
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Runs one store call under the configured deadline.
    pub async fn call<T, F>(&self, op: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, DomainError>>,
    {
        match tokio::time::timeout(self.settings.store_timeout, op).await {
            Ok(result) => result.map_err(LedgerError::from),
            Err(_) => Err(LedgerError::store_unavailable(format!(
                "store call exceeded {}ms",
                self.settings.store_timeout.as_millis()
            ))),
        }
    }

    /// Reads a row or fails with `NotFound`.
    pub async fn load(&self, id: &SubscriptionId) -> Result<Subscription, LedgerError> {
        self.call(self.store.find_by_id(id))
            .await?
            .ok_or_else(|| LedgerError::not_found(id))
    }

    /// Applies `change` to the current row under the version guard.
    ///
    /// `change` may run several times, once per attempt, each time against a
    /// fresh copy of the stored row. A `NoOp` writes and audits nothing.
    /// Invariant violations are audited as failed attempts.
    pub async fn mutate<F>(
        &self,
        id: SubscriptionId,
        actor: &Actor,
        action: &str,
        change: F,
    ) -> Result<Mutation, LedgerError>
    where
        F: FnMut(&mut Subscription, &PlanCatalog, Timestamp) -> Result<TransitionOutcome, LedgerError>
            + Send,
    {
        self.mutate_with_reason(id, actor, action, None, change).await
    }

    /// `mutate` with an operator's reason carried into every audit record.
    pub async fn mutate_with_reason<F>(
        &self,
        id: SubscriptionId,
        actor: &Actor,
        action: &str,
        reason: Option<&str>,
        mut change: F,
    ) -> Result<Mutation, LedgerError>
    where
        F: FnMut(&mut Subscription, &PlanCatalog, Timestamp) -> Result<TransitionOutcome, LedgerError>
            + Send,
    {
        for attempt in 0..=self.settings.max_retries {
            let current = self.load(&id).await?;
            let mut next = current.clone();
            let now = self.clock.now();

            match change(&mut next, &self.catalog, now) {
                Ok(TransitionOutcome::Applied) => {}
                Ok(TransitionOutcome::NoOp) => {
                    debug!(subscription_id = %id, action, "already in target state");
                    return Ok(Mutation {
                        subscription: current,
                        outcome: TransitionOutcome::NoOp,
                    });
                }
                Err(err) => {
                    if err.is_invariant_violation() {
                        warn!(subscription_id = %id, action, actor = %actor, reason = %err, "mutation rejected");
                        self.audit
                            .record(
                                AuditRecord::rejected(actor.clone(), action, Some(&current), err.to_string(), now)
                                    .with_reason(reason),
                            )
                            .await;
                    }
                    return Err(err);
                }
            }

            match self.call(self.store.update(&next, current.version)).await? {
                UpdateResult::Updated => {
                    info!(
                        subscription_id = %id,
                        action,
                        actor = %actor,
                        status = %next.status,
                        version = next.version,
                        "subscription updated"
                    );
                    self.audit
                        .record(
                            AuditRecord::applied(actor.clone(), action, Some(&current), &next, now)
                                .with_reason(reason),
                        )
                        .await;
                    return Ok(Mutation {
                        subscription: next,
                        outcome: TransitionOutcome::Applied,
                    });
                }
                UpdateResult::VersionMismatch => {
                    debug!(subscription_id = %id, action, attempt, "version conflict, retrying");
                }
                UpdateResult::LiveSubscriptionExists => {
                    let err = LedgerError::already_subscribed(current.user_id.clone());
                    warn!(subscription_id = %id, action, reason = %err, "mutation rejected");
                    self.audit
                        .record(
                            AuditRecord::rejected(actor.clone(), action, Some(&current), err.to_string(), now)
                                .with_reason(reason),
                        )
                        .await;
                    return Err(err);
                }
            }
        }

        warn!(
            subscription_id = %id,
            action,
            retries = self.settings.max_retries,
            "retry budget exhausted"
        );
        Err(LedgerError::Conflict(id))
    }
}

/// A user may only act on their own rows; others look absent.
pub(crate) fn ensure_owner(actor: &Actor, subscription: &Subscription) -> Result<(), LedgerError> {
    match actor {
        Actor::User(user_id) if user_id != &subscription.user_id => {
            Err(LedgerError::not_found(subscription.id))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::clock::FixedClock;
    use crate::adapters::memory::{InMemoryAuditLog, InMemorySubscriptionStore};
    use crate::domain::foundation::{ErrorCode, UserId};
    use crate::ports::{
        InsertResult, ScanCursor, SubscriptionCounts, SubscriptionFilter, SubscriptionPage,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn t0() -> Timestamp {
        Timestamp::from_unix_secs(1_700_000_000).unwrap()
    }

    fn subscription() -> Subscription {
        Subscription::create(
            SubscriptionId::new(),
            UserId::new("7").unwrap(),
            PlanCatalog::standard().get_plan("premium").unwrap(),
            0,
            t0(),
        )
        .unwrap()
    }

    fn context(store: Arc<dyn SubscriptionStore>, log: Arc<InMemoryAuditLog>) -> LedgerContext {
        LedgerContext::new(
            store,
            AuditRecorder::new(log),
            Arc::new(PlanCatalog::standard()),
            Arc::new(FixedClock::new(t0().add_secs(60))),
        )
    }

    // ════════════════════════════════════════════════════════════════
    // Mock store that always loses the version race
    // ════════════════════════════════════════════════════════════════

    struct ContendedStore {
        row: Subscription,
        updates: AtomicU32,
        delay: Option<Duration>,
    }

    impl ContendedStore {
        fn new(row: Subscription) -> Self {
            Self {
                row,
                updates: AtomicU32::new(0),
                delay: None,
            }
        }

        fn slow(row: Subscription) -> Self {
            Self {
                delay: Some(Duration::from_millis(200)),
                ..Self::new(row)
            }
        }
    }

    #[async_trait]
    impl SubscriptionStore for ContendedStore {
        async fn insert(&self, _s: &Subscription) -> Result<InsertResult, DomainError> {
            Ok(InsertResult::Inserted)
        }
        async fn update(&self, _s: &Subscription, _v: u64) -> Result<UpdateResult, DomainError> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            Ok(UpdateResult::VersionMismatch)
        }
        async fn find_by_id(&self, _id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(Some(self.row.clone()))
        }
        async fn find_live_for_user(&self, _u: &UserId) -> Result<Option<Subscription>, DomainError> {
            Ok(None)
        }
        async fn find_latest_for_user(&self, _u: &UserId) -> Result<Option<Subscription>, DomainError> {
            Ok(None)
        }
        async fn find_by_external_subscription_ref(
            &self,
            _r: &str,
        ) -> Result<Option<Subscription>, DomainError> {
            Ok(None)
        }
        async fn list(
            &self,
            _f: &SubscriptionFilter,
            _l: u32,
            _o: u32,
        ) -> Result<SubscriptionPage, DomainError> {
            Ok(SubscriptionPage::default())
        }
        async fn counts(&self) -> Result<SubscriptionCounts, DomainError> {
            Err(DomainError::new(ErrorCode::DatabaseError, "unsupported"))
        }
        async fn find_trials_expiring(
            &self,
            _f: Timestamp,
            _u: Timestamp,
            _c: ScanCursor,
        ) -> Result<Vec<Subscription>, DomainError> {
            Ok(vec![])
        }
        async fn find_expired_trials(
            &self,
            _n: Timestamp,
            _c: ScanCursor,
        ) -> Result<Vec<Subscription>, DomainError> {
            Ok(vec![])
        }
        async fn find_pending_cancellations(
            &self,
            _n: Timestamp,
            _c: ScanCursor,
        ) -> Result<Vec<Subscription>, DomainError> {
            Ok(vec![])
        }
        async fn claim_trial_notification(
            &self,
            _id: &SubscriptionId,
            _at: Timestamp,
        ) -> Result<bool, DomainError> {
            Ok(false)
        }
        async fn release_trial_notification(
            &self,
            _id: &SubscriptionId,
            _at: Timestamp,
        ) -> Result<bool, DomainError> {
            Ok(false)
        }
    }

    // ════════════════════════════════════════════════════════════════
    // Tests
    // ════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn applied_change_is_written_and_audited() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let log = Arc::new(InMemoryAuditLog::new());
        let sub = subscription();
        store.insert(&sub).await.unwrap();
        let ctx = context(store.clone(), log.clone());

        let mutation = ctx
            .mutate(sub.id, &Actor::Sweeper, "schedule_cancel", |s, _, now| {
                s.schedule_cancellation(now)?;
                Ok(TransitionOutcome::Applied)
            })
            .await
            .unwrap();

        assert_eq!(mutation.outcome, TransitionOutcome::Applied);
        assert_eq!(mutation.subscription.version, 1);
        let stored = store.find_by_id(&sub.id).await.unwrap().unwrap();
        assert!(stored.cancel_at_period_end);
        let records = log.all().await;
        assert_eq!(records.len(), 1);
        assert!(records[0].success);
        assert!(records[0].before_state.is_some());
    }

    #[tokio::test]
    async fn no_op_writes_and_audits_nothing() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let log = Arc::new(InMemoryAuditLog::new());
        let sub = subscription();
        store.insert(&sub).await.unwrap();
        let ctx = context(store.clone(), log.clone());

        let mutation = ctx
            .mutate(sub.id, &Actor::Webhook, "noop", |_, _, _| Ok(TransitionOutcome::NoOp))
            .await
            .unwrap();

        assert_eq!(mutation.outcome, TransitionOutcome::NoOp);
        assert_eq!(store.find_by_id(&sub.id).await.unwrap().unwrap().version, 0);
        assert!(log.all().await.is_empty());
    }

    #[tokio::test]
    async fn invariant_violation_is_audited_as_failure() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let log = Arc::new(InMemoryAuditLog::new());
        let mut sub = subscription();
        sub.cancel_immediately(t0()).unwrap();
        store.insert(&sub).await.unwrap();
        let ctx = context(store, log.clone());

        let result = ctx
            .mutate(sub.id, &Actor::Sweeper, "cancel", |s, _, now| {
                s.cancel_immediately(now)?;
                Ok(TransitionOutcome::Applied)
            })
            .await;

        assert!(matches!(result, Err(LedgerError::InvalidTransition { .. })));
        let records = log.all().await;
        assert_eq!(records.len(), 1);
        assert!(!records[0].success);
    }

    #[tokio::test]
    async fn missing_row_is_not_found_and_not_audited() {
        let log = Arc::new(InMemoryAuditLog::new());
        let ctx = context(Arc::new(InMemorySubscriptionStore::new()), log.clone());

        let result = ctx
            .mutate(SubscriptionId::new(), &Actor::Sweeper, "cancel", |_, _, _| {
                Ok(TransitionOutcome::Applied)
            })
            .await;

        assert!(matches!(result, Err(LedgerError::NotFound(_))));
        assert!(log.all().await.is_empty());
    }

    #[tokio::test]
    async fn retries_are_bounded_then_conflict() {
        let sub = subscription();
        let store = Arc::new(ContendedStore::new(sub.clone()));
        let ctx = context(store.clone(), Arc::new(InMemoryAuditLog::new())).with_settings(
            LedgerSettings {
                max_retries: 3,
                store_timeout: Duration::from_secs(1),
            },
        );

        let result = ctx
            .mutate(sub.id, &Actor::Sweeper, "schedule_cancel", |s, _, now| {
                s.schedule_cancellation(now)?;
                Ok(TransitionOutcome::Applied)
            })
            .await;

        assert_eq!(result.unwrap_err(), LedgerError::Conflict(sub.id));
        assert_eq!(store.updates.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn slow_store_times_out_as_unavailable() {
        let sub = subscription();
        let ctx = context(
            Arc::new(ContendedStore::slow(sub.clone())),
            Arc::new(InMemoryAuditLog::new()),
        )
        .with_settings(LedgerSettings {
            max_retries: 0,
            store_timeout: Duration::from_millis(10),
        });

        let result = ctx.load(&sub.id).await;

        assert!(matches!(result, Err(LedgerError::StoreUnavailable(_))));
        assert!(result.unwrap_err().is_retryable());
    }

    #[test]
    fn other_users_cannot_touch_a_row() {
        let sub = subscription();
        let stranger = Actor::User(UserId::new("8").unwrap());
        let owner = Actor::User(UserId::new("7").unwrap());

        assert!(matches!(ensure_owner(&stranger, &sub), Err(LedgerError::NotFound(_))));
        assert!(ensure_owner(&owner, &sub).is_ok());
        assert!(ensure_owner(&Actor::Webhook, &sub).is_ok());
    }
}
