//! PostgreSQL implementation of SubscriptionStore.
//!
//! The single-live-row rule is enforced by the partial unique index
//! `subscriptions_one_live_per_user`; the version guard is the `WHERE`
//! clause of the update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{db_error, is_constraint};
use crate::domain::catalog::PlanId;
use crate::domain::foundation::{DomainError, ErrorCode, SubscriptionId, Timestamp, UserId};
use crate::domain::subscription::{Subscription, SubscriptionStatus};
use crate::ports::{
    InsertResult, ScanCursor, SubscriptionCounts, SubscriptionFilter, SubscriptionPage,
    SubscriptionStore, UpdateResult,
};

const LIVE_INDEX: &str = "subscriptions_one_live_per_user";

const COLUMNS: &str = r#"
    id, user_id, status, plan_id,
    external_customer_ref, external_subscription_ref, external_price_ref,
    current_period_start, current_period_end, cancel_at_period_end,
    trial_start, trial_end, trial_days, is_trialing, trial_notified_at,
    created_at, updated_at, canceled_at, version
"#;

/// PostgreSQL implementation of the SubscriptionStore port.
pub struct PostgresSubscriptionStore {
    pool: PgPool,
}

impl PostgresSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(
        &self,
        clause: &str,
        bind: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        let sql = format!(
            "SELECT {} FROM subscriptions WHERE {} ORDER BY created_at DESC, id DESC LIMIT 1",
            COLUMNS, clause
        );
        let row: Option<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(bind)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to fetch subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }

    /// Keyset page over `predicate`, which may read `$1` (now) and `$2` (until).
    async fn scan(
        &self,
        predicate: &str,
        now: Timestamp,
        until: Option<Timestamp>,
        cursor: ScanCursor,
    ) -> Result<Vec<Subscription>, DomainError> {
        let sql = format!(
            "SELECT {} FROM subscriptions \
             WHERE {} AND ($3::uuid IS NULL OR id > $3) \
             ORDER BY id ASC LIMIT $4",
            COLUMNS, predicate
        );
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(now.as_datetime())
            .bind(until.map(|t| *t.as_datetime()))
            .bind(cursor.after.map(|id| *id.as_uuid()))
            .bind(i64::from(cursor.limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to scan subscriptions", e))?;

        rows.into_iter().map(Subscription::try_from).collect()
    }
}

/// Database row representation of a subscription.
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    user_id: String,
    status: String,
    plan_id: String,
    external_customer_ref: Option<String>,
    external_subscription_ref: Option<String>,
    external_price_ref: Option<String>,
    current_period_start: DateTime<Utc>,
    current_period_end: DateTime<Utc>,
    cancel_at_period_end: bool,
    trial_start: Option<DateTime<Utc>>,
    trial_end: Option<DateTime<Utc>>,
    trial_days: i32,
    is_trialing: bool,
    trial_notified_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    canceled_at: Option<DateTime<Utc>>,
    version: i64,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let corrupt = |field: &str, detail: String| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid {} in subscription {}: {}", field, id, detail),
            )
        };

        Ok(Subscription {
            id: SubscriptionId::from_uuid(row.id),
            user_id: UserId::new(row.user_id).map_err(|e| corrupt("user_id", e.to_string()))?,
            status: parse_status(&row.status)?,
            plan_id: PlanId::new(row.plan_id).map_err(|e| corrupt("plan_id", e.to_string()))?,
            external_customer_ref: row.external_customer_ref,
            external_subscription_ref: row.external_subscription_ref,
            external_price_ref: row.external_price_ref,
            current_period_start: Timestamp::from_datetime(row.current_period_start),
            current_period_end: Timestamp::from_datetime(row.current_period_end),
            cancel_at_period_end: row.cancel_at_period_end,
            trial_start: row.trial_start.map(Timestamp::from_datetime),
            trial_end: row.trial_end.map(Timestamp::from_datetime),
            trial_days: u32::try_from(row.trial_days)
                .map_err(|e| corrupt("trial_days", e.to_string()))?,
            is_trialing: row.is_trialing,
            trial_notified_at: row.trial_notified_at.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
            canceled_at: row.canceled_at.map(Timestamp::from_datetime),
            version: u64::try_from(row.version).map_err(|e| corrupt("version", e.to_string()))?,
        })
    }
}

fn parse_status(s: &str) -> Result<SubscriptionStatus, DomainError> {
    s.parse().map_err(|_| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid status value: {}", s),
        )
    })
}

fn version_param(version: u64) -> Result<i64, DomainError> {
    i64::try_from(version).map_err(|_| DomainError::database("version out of range"))
}

#[async_trait]
impl SubscriptionStore for PostgresSubscriptionStore {
    async fn insert(&self, subscription: &Subscription) -> Result<InsertResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, user_id, status, plan_id,
                external_customer_ref, external_subscription_ref, external_price_ref,
                current_period_start, current_period_end, cancel_at_period_end,
                trial_start, trial_end, trial_days, is_trialing, trial_notified_at,
                created_at, updated_at, canceled_at, version
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19
            )
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.user_id.as_str())
        .bind(subscription.status.as_str())
        .bind(subscription.plan_id.as_str())
        .bind(&subscription.external_customer_ref)
        .bind(&subscription.external_subscription_ref)
        .bind(&subscription.external_price_ref)
        .bind(subscription.current_period_start.as_datetime())
        .bind(subscription.current_period_end.as_datetime())
        .bind(subscription.cancel_at_period_end)
        .bind(subscription.trial_start.map(|t| *t.as_datetime()))
        .bind(subscription.trial_end.map(|t| *t.as_datetime()))
        .bind(
            i32::try_from(subscription.trial_days)
                .map_err(|_| DomainError::database("trial_days out of range"))?,
        )
        .bind(subscription.is_trialing)
        .bind(subscription.trial_notified_at.map(|t| *t.as_datetime()))
        .bind(subscription.created_at.as_datetime())
        .bind(subscription.updated_at.as_datetime())
        .bind(subscription.canceled_at.map(|t| *t.as_datetime()))
        .bind(version_param(subscription.version)?)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertResult::Inserted),
            Err(e) if is_constraint(&e, LIVE_INDEX) => Ok(InsertResult::LiveSubscriptionExists),
            Err(e) => Err(db_error("Failed to insert subscription", e)),
        }
    }

    async fn update(
        &self,
        subscription: &Subscription,
        expected_version: u64,
    ) -> Result<UpdateResult, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET
                status = $3,
                plan_id = $4,
                external_customer_ref = $5,
                external_subscription_ref = $6,
                external_price_ref = $7,
                current_period_start = $8,
                current_period_end = $9,
                cancel_at_period_end = $10,
                trial_start = $11,
                trial_end = $12,
                is_trialing = $13,
                trial_notified_at = $14,
                updated_at = $15,
                canceled_at = $16,
                version = $17
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(version_param(expected_version)?)
        .bind(subscription.status.as_str())
        .bind(subscription.plan_id.as_str())
        .bind(&subscription.external_customer_ref)
        .bind(&subscription.external_subscription_ref)
        .bind(&subscription.external_price_ref)
        .bind(subscription.current_period_start.as_datetime())
        .bind(subscription.current_period_end.as_datetime())
        .bind(subscription.cancel_at_period_end)
        .bind(subscription.trial_start.map(|t| *t.as_datetime()))
        .bind(subscription.trial_end.map(|t| *t.as_datetime()))
        .bind(subscription.is_trialing)
        .bind(subscription.trial_notified_at.map(|t| *t.as_datetime()))
        .bind(subscription.updated_at.as_datetime())
        .bind(subscription.canceled_at.map(|t| *t.as_datetime()))
        .bind(version_param(subscription.version)?)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 1 => Ok(UpdateResult::Updated),
            Ok(_) => Ok(UpdateResult::VersionMismatch),
            Err(e) if is_constraint(&e, LIVE_INDEX) => Ok(UpdateResult::LiveSubscriptionExists),
            Err(e) => Err(db_error("Failed to update subscription", e)),
        }
    }

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        let sql = format!("SELECT {} FROM subscriptions WHERE id = $1", COLUMNS);
        let row: Option<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to fetch subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn find_live_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        self.fetch_one_where("user_id = $1 AND status <> 'canceled'", user_id.as_str())
            .await
    }

    async fn find_latest_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        self.fetch_one_where("user_id = $1", user_id.as_str()).await
    }

    async fn find_by_external_subscription_ref(
        &self,
        external_ref: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        self.fetch_one_where("external_subscription_ref = $1", external_ref)
            .await
    }

    async fn list(
        &self,
        filter: &SubscriptionFilter,
        limit: u32,
        offset: u32,
    ) -> Result<SubscriptionPage, DomainError> {
        let status = filter.status.map(|s| s.as_str());
        let plan_id = filter.plan_id.as_ref().map(|p| p.as_str());

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM subscriptions
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR plan_id = $2)
            "#,
        )
        .bind(status)
        .bind(plan_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to count subscriptions", e))?;

        let sql = format!(
            "SELECT {} FROM subscriptions \
             WHERE ($1::text IS NULL OR status = $1) \
               AND ($2::text IS NULL OR plan_id = $2) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3 OFFSET $4",
            COLUMNS
        );
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(status)
            .bind(plan_id)
            .bind(i64::from(limit))
            .bind(i64::from(offset))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list subscriptions", e))?;

        Ok(SubscriptionPage {
            items: rows
                .into_iter()
                .map(Subscription::try_from)
                .collect::<Result<_, _>>()?,
            total: u64::try_from(total).unwrap_or(0),
        })
    }

    async fn counts(&self) -> Result<SubscriptionCounts, DomainError> {
        let rows: Vec<(String, String, i64)> = sqlx::query_as(
            "SELECT status, plan_id, COUNT(*) FROM subscriptions GROUP BY status, plan_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to count subscriptions", e))?;

        let mut counts = SubscriptionCounts::default();
        for (status, plan_id, count) in rows {
            let plan_id = PlanId::new(plan_id).map_err(|e| DomainError::database(e.to_string()))?;
            counts.add(parse_status(&status)?, plan_id, u64::try_from(count).unwrap_or(0));
        }
        Ok(counts)
    }

    async fn find_trials_expiring(
        &self,
        from: Timestamp,
        until: Timestamp,
        cursor: ScanCursor,
    ) -> Result<Vec<Subscription>, DomainError> {
        self.scan(
            "status = 'trialing' AND is_trialing AND trial_notified_at IS NULL \
             AND trial_end >= $1 AND trial_end <= $2",
            from,
            Some(until),
            cursor,
        )
        .await
    }

    async fn find_expired_trials(
        &self,
        now: Timestamp,
        cursor: ScanCursor,
    ) -> Result<Vec<Subscription>, DomainError> {
        self.scan(
            "status = 'trialing' AND trial_end <= $1",
            now,
            None,
            cursor,
        )
        .await
    }

    async fn find_pending_cancellations(
        &self,
        now: Timestamp,
        cursor: ScanCursor,
    ) -> Result<Vec<Subscription>, DomainError> {
        self.scan(
            "status = 'active' AND cancel_at_period_end AND current_period_end <= $1",
            now,
            None,
            cursor,
        )
        .await
    }

    async fn claim_trial_notification(
        &self,
        id: &SubscriptionId,
        at: Timestamp,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "UPDATE subscriptions SET trial_notified_at = $2 \
             WHERE id = $1 AND trial_notified_at IS NULL",
        )
        .bind(id.as_uuid())
        .bind(at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to claim trial notice", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_trial_notification(
        &self,
        id: &SubscriptionId,
        claimed_at: Timestamp,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "UPDATE subscriptions SET trial_notified_at = NULL \
             WHERE id = $1 AND trial_notified_at = $2",
        )
        .bind(id.as_uuid())
        .bind(claimed_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to release trial notice", e))?;

        Ok(result.rows_affected() == 1)
    }
}
