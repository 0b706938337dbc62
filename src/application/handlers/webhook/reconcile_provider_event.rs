//! ReconcileProviderEventHandler - Command handler for inbound provider webhooks.
//!
//! Each delivery runs through four steps and ends in exactly one outcome:
//!
//! 1. **Verify** the signature; failure is final and never reveals why
//! 2. **Claim** the provider event id; a delivery that loses the claim is a
//!    duplicate and touches nothing
//! 3. **Map & apply** the event as a ledger transition
//! 4. **Finalize** by recording the outcome on the claim
//!
//! Business outcomes (applied, skipped, rejected) are acknowledged to the
//! provider. Transient store failures release the claim and return an error
//! so the provider redelivers.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::application::handlers::subscription::{
    ApplyExternalTransitionCommand, ApplyExternalTransitionHandler,
};
use crate::application::ledger::LedgerContext;
use crate::domain::audit::Actor;
use crate::domain::foundation::{SubscriptionId, Timestamp};
use crate::domain::subscription::{
    ExternalRefs, LedgerError, TransitionEffect, TransitionKind, TransitionOutcome,
};
use crate::domain::webhook::{
    CheckoutSession, Invoice, ProviderEvent, ProviderEventKind, ProviderSubscription,
    WebhookError, WebhookVerifier,
};
use crate::ports::{ClaimResult, EventOutcome, ProcessedEvent, ProcessedEventStore};

/// An unfinished claim older than this belongs to a delivery that died.
const CLAIM_LEASE_SECS: i64 = 300;

/// Command carrying one raw webhook delivery.
#[derive(Debug, Clone)]
pub struct ReconcileProviderEventCommand {
    /// Raw request body, exactly as received.
    pub payload: Vec<u8>,
    /// Signature header value, if the request had one.
    pub signature: Option<String>,
}

/// Terminal outcome of one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileProviderEventResult {
    pub event_id: String,
    pub event_type: String,
    pub outcome: EventOutcome,
    pub subscription_id: Option<SubscriptionId>,
    pub note: Option<String>,
}

/// Handler for provider webhook deliveries.
#[derive(Clone)]
pub struct ReconcileProviderEventHandler {
    verifier: Arc<WebhookVerifier>,
    processed: Arc<dyn ProcessedEventStore>,
    ledger: LedgerContext,
    transitions: ApplyExternalTransitionHandler,
}

impl ReconcileProviderEventHandler {
    pub fn new(
        verifier: Arc<WebhookVerifier>,
        processed: Arc<dyn ProcessedEventStore>,
        ledger: LedgerContext,
    ) -> Self {
        let transitions = ApplyExternalTransitionHandler::new(ledger.clone());
        Self {
            verifier,
            processed,
            ledger,
            transitions,
        }
    }

    pub async fn handle(
        &self,
        cmd: ReconcileProviderEventCommand,
    ) -> Result<ReconcileProviderEventResult, WebhookError> {
        let now = self.ledger.now();

        // 1. Verify
        let event = match self
            .verifier
            .verify_and_parse(&cmd.payload, cmd.signature.as_deref(), now)
        {
            Ok(event) => event,
            Err(err) => {
                self.record_verification_failure(&err, now).await;
                return Err(err);
            }
        };

        // 2. Claim
        let claim = ProcessedEvent::new(&event.id, &event.event_type, EventOutcome::Processing, now);
        let claimed = self
            .ledger
            .call(self.processed.claim(&claim, now.add_secs(-CLAIM_LEASE_SECS)))
            .await
            .map_err(store_error)?;
        if claimed == ClaimResult::AlreadyClaimed {
            let existing = self
                .ledger
                .call(self.processed.find(&event.id))
                .await
                .map_err(store_error)?;
            debug!(event_id = %event.id, event_type = %event.event_type, "duplicate delivery skipped");
            return Ok(ReconcileProviderEventResult {
                event_id: event.id,
                event_type: event.event_type,
                outcome: EventOutcome::DuplicateSkipped,
                subscription_id: existing.and_then(|e| e.subscription_id),
                note: Some("already processed".to_string()),
            });
        }

        // 3. Map & apply
        let disposition = match self.apply(&event).await {
            Ok(disposition) => disposition,
            Err(err) => {
                self.release(&event.id).await;
                return Err(err);
            }
        };

        // 4. Finalize
        let mut record =
            ProcessedEvent::new(&event.id, &event.event_type, disposition.outcome, now)
                .for_subscription(disposition.subscription_id);
        if let Some(note) = &disposition.note {
            record = record.with_note(note.clone());
        }
        self.ledger
            .call(self.processed.complete(&record))
            .await
            .map_err(store_error)?;
        let outcome = disposition.outcome;

        match outcome {
            EventOutcome::Applied => info!(
                event_id = %event.id,
                event_type = %event.event_type,
                subscription_id = ?disposition.subscription_id,
                "provider event applied"
            ),
            EventOutcome::Rejected => warn!(
                event_id = %event.id,
                event_type = %event.event_type,
                subscription_id = ?disposition.subscription_id,
                note = ?disposition.note,
                "provider event rejected"
            ),
            EventOutcome::DuplicateSkipped | EventOutcome::Processing => debug!(
                event_id = %event.id,
                event_type = %event.event_type,
                note = ?disposition.note,
                "provider event skipped"
            ),
        }

        Ok(ReconcileProviderEventResult {
            event_id: event.id,
            event_type: event.event_type,
            outcome,
            subscription_id: disposition.subscription_id,
            note: disposition.note,
        })
    }

    /// Gives the event id back after a transient failure so the provider's
    /// redelivery is processed instead of skipped.
    async fn release(&self, event_id: &str) {
        if let Err(err) = self.ledger.call(self.processed.release(event_id)).await {
            warn!(event_id, error = %err, "failed to release event claim");
        }
    }

    async fn record_verification_failure(&self, err: &WebhookError, now: Timestamp) {
        match err {
            WebhookError::SignatureInvalid(reason) => {
                warn!(target: "security", reason = reason.as_str(), "webhook signature rejected");
                self.ledger
                    .audit()
                    .rejected(&Actor::Webhook, "verify_webhook", None, &reason.as_str(), now)
                    .await;
            }
            other => warn!(error = %other, "webhook payload rejected"),
        }
    }

    async fn apply(&self, event: &ProviderEvent) -> Result<Disposition, WebhookError> {
        let Some(occurred_at) = event.occurred_at() else {
            return Ok(Disposition::rejected(None, "event timestamp out of range"));
        };

        let (target, kind, effect) = match route(event, occurred_at) {
            Route::Apply {
                target,
                kind,
                effect,
            } => (target, kind, effect),
            Route::Acknowledge(note) => return Ok(Disposition::skipped(None, note)),
            Route::Reject(note) => return Ok(Disposition::rejected(None, note)),
        };

        let Some(subscription_id) = self.correlate(&target).await? else {
            return Ok(Disposition::rejected(None, "no subscription matches the event"));
        };

        let result = self
            .transitions
            .handle(ApplyExternalTransitionCommand {
                subscription_id,
                actor: Actor::Webhook,
                kind,
                effect,
            })
            .await;

        match result {
            Ok(mutation) if mutation.outcome == TransitionOutcome::Applied => {
                Ok(Disposition::applied(subscription_id))
            }
            Ok(_) => Ok(Disposition::skipped(
                Some(subscription_id),
                "already in target state",
            )),
            Err(err) if err.is_retryable() => Err(WebhookError::Ledger(err)),
            Err(err) => Ok(Disposition::rejected(Some(subscription_id), err.to_string())),
        }
    }

    /// Resolves the local row an event refers to; never guesses.
    async fn correlate(&self, target: &Correlation) -> Result<Option<SubscriptionId>, WebhookError> {
        if let Some(external_ref) = &target.external_ref {
            let found = self
                .ledger
                .call(
                    self.ledger
                        .store()
                        .find_by_external_subscription_ref(external_ref),
                )
                .await
                .map_err(WebhookError::Ledger)?;
            if let Some(sub) = found {
                return Ok(Some(sub.id));
            }
        }

        Ok(target
            .local_ref
            .as_deref()
            .and_then(|id| id.parse::<SubscriptionId>().ok()))
    }
}

fn store_error(err: LedgerError) -> WebhookError {
    WebhookError::Store(err.to_string())
}

/// How the ledger should react to one event.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    Apply {
        target: Correlation,
        kind: TransitionKind,
        effect: TransitionEffect,
    },
    /// Understood, no mutation.
    Acknowledge(String),
    /// Cannot be applied as sent.
    Reject(String),
}

/// Identifiers that may point at a local subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Correlation {
    external_ref: Option<String>,
    local_ref: Option<String>,
}

#[derive(Debug, Clone)]
struct Disposition {
    outcome: EventOutcome,
    subscription_id: Option<SubscriptionId>,
    note: Option<String>,
}

impl Disposition {
    fn applied(subscription_id: SubscriptionId) -> Self {
        Self {
            outcome: EventOutcome::Applied,
            subscription_id: Some(subscription_id),
            note: None,
        }
    }

    fn skipped(subscription_id: Option<SubscriptionId>, note: impl Into<String>) -> Self {
        Self {
            outcome: EventOutcome::DuplicateSkipped,
            subscription_id,
            note: Some(note.into()),
        }
    }

    fn rejected(subscription_id: Option<SubscriptionId>, note: impl Into<String>) -> Self {
        Self {
            outcome: EventOutcome::Rejected,
            subscription_id,
            note: Some(note.into()),
        }
    }
}

/// Maps a provider event to a ledger transition.
fn route(event: &ProviderEvent, occurred_at: Timestamp) -> Route {
    let effect = TransitionEffect::at(occurred_at);

    match event.kind() {
        ProviderEventKind::CheckoutSessionCompleted => {
            let Ok(session) = event.deserialize_object::<CheckoutSession>() else {
                return Route::Reject("malformed checkout session".into());
            };
            if !session.is_subscription_mode() {
                return Route::Acknowledge("checkout session is not a subscription".into());
            }
            let Some(local_ref) = session.local_subscription_ref() else {
                return Route::Reject("checkout session carries no subscription reference".into());
            };
            Route::Apply {
                target: Correlation {
                    external_ref: None,
                    local_ref: Some(local_ref.to_string()),
                },
                kind: TransitionKind::Activate,
                effect: effect.with_refs(ExternalRefs {
                    customer: session.customer.clone(),
                    subscription: session.subscription.clone(),
                    price: None,
                }),
            }
        }
        kind @ (ProviderEventKind::InvoicePaymentSucceeded | ProviderEventKind::InvoicePaymentFailed) => {
            let Ok(invoice) = event.deserialize_object::<Invoice>() else {
                return Route::Reject("malformed invoice".into());
            };
            let Some(external_ref) = invoice.subscription.clone() else {
                return Route::Reject("invoice is not for a subscription".into());
            };
            let target = Correlation {
                external_ref: Some(external_ref.clone()),
                local_ref: None,
            };
            if kind == ProviderEventKind::InvoicePaymentFailed {
                return Route::Apply {
                    target,
                    kind: TransitionKind::MarkPastDue,
                    effect,
                };
            }
            let (start, end) = invoice.billed_period();
            Route::Apply {
                target,
                kind: TransitionKind::RenewPeriod,
                effect: effect.with_period(start, end).with_refs(ExternalRefs {
                    customer: invoice.customer.clone(),
                    subscription: Some(external_ref),
                    price: invoice.price_ref().map(String::from),
                }),
            }
        }
        kind @ (ProviderEventKind::CustomerSubscriptionUpdated
        | ProviderEventKind::CustomerSubscriptionDeleted) => {
            let Ok(subscription) = event.deserialize_object::<ProviderSubscription>() else {
                return Route::Reject("malformed subscription object".into());
            };
            let target = Correlation {
                external_ref: Some(subscription.id.clone()),
                local_ref: subscription.local_subscription_ref().map(String::from),
            };
            if kind == ProviderEventKind::CustomerSubscriptionDeleted {
                return Route::Apply {
                    target,
                    kind: TransitionKind::Cancel,
                    effect,
                };
            }
            let (start, end) = subscription.period();
            Route::Apply {
                target,
                kind: TransitionKind::SyncFromProvider,
                effect: effect
                    .with_period(start, end)
                    .with_cancel_at_period_end(subscription.cancel_at_period_end)
                    .with_refs(ExternalRefs {
                        customer: subscription.customer.clone(),
                        subscription: Some(subscription.id.clone()),
                        price: None,
                    }),
            }
        }
        ProviderEventKind::CustomerSubscriptionTrialWillEnd => {
            Route::Acknowledge("trial notices are sent by the sweeper".into())
        }
        ProviderEventKind::Unknown => {
            Route::Acknowledge(format!("unhandled event type {}", event.event_type))
        }
    }
}
