//! Trial Sweeper - time-driven transitions and their notifications.
//!
//! One run makes three passes over the store:
//!
//! | Pass | Selects | Does |
//! |------|---------|------|
//! | Trial notices | trialing, trial ends within the look-ahead, notice unclaimed | claim, send `trial_expiring`, release on send failure |
//! | Pending cancellations | active, flagged, period over | `Cancel`, send `subscription_canceled` |
//! | Expired trials | trialing, trial over | `MarkPastDue` if provider-linked, else `Cancel`; send `trial_ended` |
//!
//! Scans are keyset-paginated, every item is handled on its own, and a
//! failing item is counted and skipped. The shutdown channel is checked
//! between items.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::handlers::subscription::{ApplyExternalTransitionCommand, ApplyExternalTransitionHandler};
use super::ledger::LedgerContext;
use crate::config::{NotificationTemplates, SweeperConfig};
use crate::domain::audit::Actor;
use crate::domain::foundation::Timestamp;
use crate::domain::subscription::{
    LedgerError, Subscription, TransitionEffect, TransitionKind, TransitionOutcome,
};
use crate::ports::{Notification, Notifier, ScanCursor};

/// Sweep tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSettings {
    pub trial_lookahead_days: u32,
    pub batch_size: u32,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            trial_lookahead_days: 3,
            batch_size: 100,
        }
    }
}

impl From<&SweeperConfig> for SweepSettings {
    fn from(config: &SweeperConfig) -> Self {
        Self {
            trial_lookahead_days: config.trial_lookahead_days,
            batch_size: config.batch_size,
        }
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub trial_notices_sent: u32,
    pub cancellations_applied: u32,
    pub trials_expired: u32,
    /// Sends that failed after the transition (or claim) happened.
    pub notifications_failed: u32,
    /// Items skipped because the store or ledger failed.
    pub items_failed: u32,
    /// The run stopped early on shutdown.
    pub interrupted: bool,
}

/// Selection for one pass.
#[derive(Debug, Clone, Copy)]
enum Pass {
    TrialNotices,
    PendingCancellations,
    ExpiredTrials,
}

impl Pass {
    fn as_str(&self) -> &'static str {
        match self {
            Pass::TrialNotices => "trial_notices",
            Pass::PendingCancellations => "pending_cancellations",
            Pass::ExpiredTrials => "expired_trials",
        }
    }
}

/// Runs sweeps against the ledger.
#[derive(Clone)]
pub struct TrialSweeper {
    ledger: LedgerContext,
    transitions: ApplyExternalTransitionHandler,
    notifier: Arc<dyn Notifier>,
    templates: NotificationTemplates,
    settings: SweepSettings,
}

impl TrialSweeper {
    pub fn new(
        ledger: LedgerContext,
        notifier: Arc<dyn Notifier>,
        templates: NotificationTemplates,
        settings: SweepSettings,
    ) -> Self {
        let transitions = ApplyExternalTransitionHandler::new(ledger.clone());
        Self {
            ledger,
            transitions,
            notifier,
            templates,
            settings,
        }
    }

    /// One full sweep; stops between items once `shutdown` reads `true`.
    pub async fn run_once(&self, shutdown: &watch::Receiver<bool>) -> SweepReport {
        let mut report = SweepReport::default();
        let now = self.ledger.now();

        for pass in [
            Pass::TrialNotices,
            Pass::PendingCancellations,
            Pass::ExpiredTrials,
        ] {
            self.run_pass(pass, now, shutdown, &mut report).await;
            if report.interrupted {
                break;
            }
        }

        info!(
            notices = report.trial_notices_sent,
            cancellations = report.cancellations_applied,
            expired = report.trials_expired,
            notifications_failed = report.notifications_failed,
            items_failed = report.items_failed,
            interrupted = report.interrupted,
            "sweep finished"
        );
        report
    }

    async fn run_pass(
        &self,
        pass: Pass,
        now: Timestamp,
        shutdown: &watch::Receiver<bool>,
        report: &mut SweepReport,
    ) {
        let mut cursor = ScanCursor::first(self.settings.batch_size);

        loop {
            let page = match self.scan(pass, now, cursor).await {
                Ok(page) => page,
                Err(e) => {
                    error!(pass = pass.as_str(), error = %e, "sweep scan failed");
                    report.items_failed += 1;
                    return;
                }
            };

            for subscription in &page {
                if *shutdown.borrow() {
                    report.interrupted = true;
                    return;
                }
                match pass {
                    Pass::TrialNotices => self.notify_trial_expiring(subscription, now, report).await,
                    Pass::PendingCancellations | Pass::ExpiredTrials => {
                        self.transition(subscription, pass, now, report).await
                    }
                }
            }

            match page.last() {
                Some(last) if page.len() as u32 >= cursor.limit => cursor = cursor.after(last.id),
                _ => return,
            }
        }
    }

    async fn scan(
        &self,
        pass: Pass,
        now: Timestamp,
        cursor: ScanCursor,
    ) -> Result<Vec<Subscription>, LedgerError> {
        let store = self.ledger.store();
        match pass {
            Pass::TrialNotices => {
                let until = now.add_days(i64::from(self.settings.trial_lookahead_days));
                self.ledger
                    .call(store.find_trials_expiring(now, until, cursor))
                    .await
            }
            Pass::PendingCancellations => {
                self.ledger
                    .call(store.find_pending_cancellations(now, cursor))
                    .await
            }
            Pass::ExpiredTrials => self.ledger.call(store.find_expired_trials(now, cursor)).await,
        }
    }

    /// Claim, send, and give the claim back if the send failed.
    async fn notify_trial_expiring(
        &self,
        subscription: &Subscription,
        now: Timestamp,
        report: &mut SweepReport,
    ) {
        let store = self.ledger.store();
        let id = subscription.id;

        match self.ledger.call(store.claim_trial_notification(&id, now)).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(subscription_id = %id, "trial notice already claimed");
                return;
            }
            Err(e) => {
                warn!(subscription_id = %id, error = %e, "trial notice claim failed");
                report.items_failed += 1;
                return;
            }
        }

        let mut notification =
            Notification::new(subscription.user_id.clone(), &self.templates.trial_expiring)
                .var("subscription_id", id)
                .var("plan_id", &subscription.plan_id);
        if let Some(trial_end) = subscription.trial_end {
            notification = notification.var("trial_end", trial_end);
        }

        match self.notifier.send(&notification).await {
            Ok(()) => {
                info!(subscription_id = %id, "trial expiring notice sent");
                report.trial_notices_sent += 1;
            }
            Err(e) => {
                warn!(subscription_id = %id, error = %e, "trial notice failed, releasing claim");
                report.notifications_failed += 1;
                if let Err(e) = self
                    .ledger
                    .call(store.release_trial_notification(&id, now))
                    .await
                {
                    error!(subscription_id = %id, error = %e, "failed to release trial notice claim");
                }
            }
        }
    }

    async fn transition(
        &self,
        subscription: &Subscription,
        pass: Pass,
        now: Timestamp,
        report: &mut SweepReport,
    ) {
        let kind = match pass {
            Pass::ExpiredTrials if subscription.external_subscription_ref.is_some() => {
                TransitionKind::MarkPastDue
            }
            // No provider subscription means no invoice will ever settle the row.
            _ => TransitionKind::Cancel,
        };

        let result = self
            .transitions
            .handle(ApplyExternalTransitionCommand {
                subscription_id: subscription.id,
                actor: Actor::Sweeper,
                kind,
                effect: TransitionEffect::at(now),
            })
            .await;

        let mutation = match result {
            Ok(mutation) if mutation.outcome == TransitionOutcome::Applied => mutation,
            Ok(_) => return,
            Err(e) => {
                warn!(subscription_id = %subscription.id, kind = %kind, error = %e, "sweep transition failed");
                report.items_failed += 1;
                return;
            }
        };

        let template = match pass {
            Pass::PendingCancellations => {
                report.cancellations_applied += 1;
                &self.templates.subscription_canceled
            }
            _ => {
                report.trials_expired += 1;
                &self.templates.trial_ended
            }
        };

        let updated = mutation.subscription;
        let notification = Notification::new(updated.user_id.clone(), template)
            .var("subscription_id", updated.id)
            .var("plan_id", &updated.plan_id);
        if let Err(e) = self.notifier.send(&notification).await {
            warn!(subscription_id = %updated.id, template = %template, error = %e, "notification failed");
            report.notifications_failed += 1;
        }
    }
}
