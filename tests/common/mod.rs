//! Shared fixtures for integration tests: in-memory ports, a fixed clock,
//! and a signing helper for provider payloads.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use secrecy::Secret;
use serde_json::Value;

use subledger::adapters::clock::FixedClock;
use subledger::adapters::http::{api_router, SubscriptionAppState, WebhookAppState};
use subledger::adapters::memory::{
    InMemoryAuditLog, InMemoryProcessedEventStore, InMemorySubscriptionStore,
};
use subledger::application::handlers::webhook::{
    ReconcileProviderEventCommand, ReconcileProviderEventHandler,
};
use subledger::application::{AuditRecorder, LedgerContext, SweepSettings, TrialSweeper};
use subledger::config::NotificationTemplates;
use subledger::domain::catalog::PlanCatalog;
use subledger::domain::foundation::{DomainError, Timestamp};
use subledger::domain::webhook::WebhookVerifier;
use subledger::ports::{Notification, Notifier};

pub const WEBHOOK_SECRET: &str = "whsec_integration_secret";
pub const ADMIN_ID: &str = "admin";

pub fn t0() -> Timestamp {
    Timestamp::from_unix_secs(1_700_000_000).unwrap()
}

/// Notifier that keeps every notification it was asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn templates(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.template.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), DomainError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Every port backed by memory, wired the way `main` wires Postgres.
pub struct TestApp {
    pub ledger: LedgerContext,
    pub store: Arc<InMemorySubscriptionStore>,
    pub audit: Arc<InMemoryAuditLog>,
    pub events: Arc<InMemoryProcessedEventStore>,
    pub clock: Arc<FixedClock>,
    pub verifier: Arc<WebhookVerifier>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let audit = Arc::new(InMemoryAuditLog::new());
        let clock = Arc::new(FixedClock::new(t0()));
        let ledger = LedgerContext::new(
            store.clone(),
            AuditRecorder::new(audit.clone()),
            Arc::new(PlanCatalog::standard()),
            clock.clone(),
        );
        Self {
            ledger,
            store,
            audit,
            events: Arc::new(InMemoryProcessedEventStore::new()),
            clock,
            verifier: Arc::new(WebhookVerifier::new(Secret::new(WEBHOOK_SECRET.to_string()))),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    pub fn reconciler(&self) -> ReconcileProviderEventHandler {
        ReconcileProviderEventHandler::new(
            self.verifier.clone(),
            self.events.clone(),
            self.ledger.clone(),
        )
    }

    pub fn sweeper(&self) -> TrialSweeper {
        TrialSweeper::new(
            self.ledger.clone(),
            self.notifier.clone(),
            NotificationTemplates::default(),
            SweepSettings::default(),
        )
    }

    pub fn router(&self) -> Router {
        api_router(
            SubscriptionAppState::new(self.ledger.clone()).with_admins(&[ADMIN_ID.to_string()]),
            WebhookAppState::new(self.reconciler()),
            std::time::Duration::from_secs(5),
            &[],
        )
    }

    /// Signature header for `body`, signed at the clock's current time.
    pub fn sign(&self, body: &[u8]) -> String {
        self.verifier
            .signature_header_for(self.ledger.now().as_unix_secs(), body)
            .unwrap()
    }

    /// A provider event created now, signed now.
    pub fn signed_event(&self, id: &str, event_type: &str, object: Value) -> ReconcileProviderEventCommand {
        self.signed_event_created_at(id, event_type, object, self.ledger.now())
    }

    /// A provider event created at `created`, signed now.
    pub fn signed_event_created_at(
        &self,
        id: &str,
        event_type: &str,
        object: Value,
        created: Timestamp,
    ) -> ReconcileProviderEventCommand {
        let payload = serde_json::json!({
            "id": id,
            "type": event_type,
            "created": created.as_unix_secs(),
            "data": { "object": object },
        })
        .to_string()
        .into_bytes();
        let signature = self.sign(&payload);
        ReconcileProviderEventCommand {
            payload,
            signature: Some(signature),
        }
    }
}
