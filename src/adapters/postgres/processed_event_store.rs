//! PostgreSQL implementation of ProcessedEventStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::db_error;
use crate::domain::foundation::{DomainError, ErrorCode, SubscriptionId, Timestamp};
use crate::ports::{ClaimResult, EventOutcome, ProcessedEvent, ProcessedEventStore};

pub struct PostgresProcessedEventStore {
    pool: PgPool,
}

impl PostgresProcessedEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProcessedEventRow {
    external_event_id: String,
    event_type: String,
    subscription_id: Option<Uuid>,
    received_at: DateTime<Utc>,
    outcome: String,
    note: Option<String>,
}

impl TryFrom<ProcessedEventRow> for ProcessedEvent {
    type Error = DomainError;

    fn try_from(row: ProcessedEventRow) -> Result<Self, Self::Error> {
        let outcome: EventOutcome = row.outcome.parse().map_err(|_| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid outcome value: {}", row.outcome),
            )
        })?;

        Ok(ProcessedEvent {
            external_event_id: row.external_event_id,
            event_type: row.event_type,
            subscription_id: row.subscription_id.map(SubscriptionId::from_uuid),
            received_at: Timestamp::from_datetime(row.received_at),
            outcome,
            note: row.note,
        })
    }
}

#[async_trait]
impl ProcessedEventStore for PostgresProcessedEventStore {
    async fn find(&self, external_event_id: &str) -> Result<Option<ProcessedEvent>, DomainError> {
        let row: Option<ProcessedEventRow> = sqlx::query_as(
            r#"
            SELECT external_event_id, event_type, subscription_id, received_at, outcome, note
            FROM processed_events
            WHERE external_event_id = $1
            "#,
        )
        .bind(external_event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to fetch processed event", e))?;

        row.map(ProcessedEvent::try_from).transpose()
    }

    async fn claim(
        &self,
        event: &ProcessedEvent,
        stale_before: Timestamp,
    ) -> Result<ClaimResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO processed_events (
                external_event_id, event_type, subscription_id, received_at, outcome, note
            ) VALUES ($1, $2, NULL, $3, 'processing', NULL)
            ON CONFLICT (external_event_id) DO UPDATE
                SET received_at = EXCLUDED.received_at
                WHERE processed_events.outcome = 'processing'
                  AND processed_events.received_at < $4
            "#,
        )
        .bind(&event.external_event_id)
        .bind(&event.event_type)
        .bind(event.received_at.as_datetime())
        .bind(stale_before.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to claim processed event", e))?;

        if result.rows_affected() == 1 {
            Ok(ClaimResult::Claimed)
        } else {
            Ok(ClaimResult::AlreadyClaimed)
        }
    }

    async fn complete(&self, event: &ProcessedEvent) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE processed_events
            SET outcome = $2, subscription_id = $3, note = $4
            WHERE external_event_id = $1 AND outcome = 'processing'
            "#,
        )
        .bind(&event.external_event_id)
        .bind(event.outcome.as_str())
        .bind(event.subscription_id.map(|id| *id.as_uuid()))
        .bind(&event.note)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to complete processed event", e))?;

        Ok(())
    }

    async fn release(&self, external_event_id: &str) -> Result<(), DomainError> {
        sqlx::query(
            "DELETE FROM processed_events WHERE external_event_id = $1 AND outcome = 'processing'",
        )
        .bind(external_event_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to release processed event", e))?;

        Ok(())
    }

    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM processed_events WHERE received_at < $1")
            .bind(cutoff.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to purge processed events", e))?;

        Ok(result.rows_affected())
    }
}
