//! PostgreSQL implementation of AuditLog.
//!
//! Insert-only; the table has no update path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::db_error;
use crate::domain::audit::{Actor, AuditRecord};
use crate::domain::foundation::{AuditRecordId, DomainError, SubscriptionId, Timestamp};
use crate::ports::AuditLog;

pub struct PostgresAuditLog {
    pool: PgPool,
}

impl PostgresAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AuditRecordRow {
    id: Uuid,
    actor: Option<String>,
    action: String,
    target_subscription_id: Option<Uuid>,
    before_state: Option<serde_json::Value>,
    after_state: Option<serde_json::Value>,
    success: bool,
    error_detail: Option<String>,
    reason: Option<String>,
    recorded_at: DateTime<Utc>,
}

impl From<AuditRecordRow> for AuditRecord {
    fn from(row: AuditRecordRow) -> Self {
        AuditRecord {
            id: AuditRecordId::from_uuid(row.id),
            actor: row.actor.as_deref().and_then(Actor::from_id),
            action: row.action,
            target_subscription_id: row.target_subscription_id.map(SubscriptionId::from_uuid),
            before_state: row.before_state,
            after_state: row.after_state,
            success: row.success,
            error_detail: row.error_detail,
            reason: row.reason,
            timestamp: Timestamp::from_datetime(row.recorded_at),
        }
    }
}

#[async_trait]
impl AuditLog for PostgresAuditLog {
    async fn append(&self, record: &AuditRecord) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO audit_records (
                id, actor, action, target_subscription_id,
                before_state, after_state, success, error_detail, reason, recorded_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.actor.as_ref().map(|a| a.as_id().to_string()))
        .bind(&record.action)
        .bind(record.target_subscription_id.map(|id| *id.as_uuid()))
        .bind(&record.before_state)
        .bind(&record.after_state)
        .bind(record.success)
        .bind(&record.error_detail)
        .bind(&record.reason)
        .bind(record.timestamp.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to append audit record", e))?;

        Ok(())
    }

    async fn for_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<AuditRecord>, DomainError> {
        let rows: Vec<AuditRecordRow> = sqlx::query_as(
            r#"
            SELECT id, actor, action, target_subscription_id,
                   before_state, after_state, success, error_detail, reason, recorded_at
            FROM audit_records
            WHERE target_subscription_id = $1
            ORDER BY recorded_at ASC, id ASC
            "#,
        )
        .bind(subscription_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load audit trail", e))?;

        Ok(rows.into_iter().map(AuditRecord::from).collect())
    }
}
