//! In-memory implementation of ProcessedEventStore.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{ClaimResult, EventOutcome, ProcessedEvent, ProcessedEventStore};

#[derive(Default)]
pub struct InMemoryProcessedEventStore {
    events: RwLock<HashMap<String, ProcessedEvent>>,
}

impl InMemoryProcessedEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

#[async_trait]
impl ProcessedEventStore for InMemoryProcessedEventStore {
    async fn find(&self, external_event_id: &str) -> Result<Option<ProcessedEvent>, DomainError> {
        Ok(self.events.read().await.get(external_event_id).cloned())
    }

    async fn claim(
        &self,
        event: &ProcessedEvent,
        stale_before: Timestamp,
    ) -> Result<ClaimResult, DomainError> {
        let mut events = self.events.write().await;
        if let Some(existing) = events.get(&event.external_event_id) {
            if existing.is_finished() || existing.received_at >= stale_before {
                return Ok(ClaimResult::AlreadyClaimed);
            }
        }
        let mut claim = event.clone();
        claim.outcome = EventOutcome::Processing;
        events.insert(event.external_event_id.clone(), claim);
        Ok(ClaimResult::Claimed)
    }

    async fn complete(&self, event: &ProcessedEvent) -> Result<(), DomainError> {
        let mut events = self.events.write().await;
        if let Some(existing) = events.get_mut(&event.external_event_id) {
            if !existing.is_finished() {
                existing.outcome = event.outcome;
                existing.subscription_id = event.subscription_id;
                existing.note = event.note.clone();
            }
        }
        Ok(())
    }

    async fn release(&self, external_event_id: &str) -> Result<(), DomainError> {
        let mut events = self.events.write().await;
        if events
            .get(external_event_id)
            .map(|existing| !existing.is_finished())
            .unwrap_or(false)
        {
            events.remove(external_event_id);
        }
        Ok(())
    }

    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, DomainError> {
        let mut events = self.events.write().await;
        let before = events.len();
        events.retain(|_, event| event.received_at >= cutoff);
        Ok((before - events.len()) as u64)
    }
}
