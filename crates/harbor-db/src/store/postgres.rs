//! Postgres-backed [`WebhookStore`] implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{
    DeliveryAttemptOutcome, NewRetryJob, NewWebhook, NewWebhookDelivery, RetryJob, RetryJobStatus,
    Webhook, WebhookDelivery, WebhookUpdate, RETRY_JOB_TYPE,
};
use crate::store::WebhookStore;

/// Webhook store backed by a Postgres pool.
#[derive(Clone)]
pub struct PgWebhookStore {
    pool: PgPool,
}

impl PgWebhookStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl WebhookStore for PgWebhookStore {
    async fn insert_webhook(&self, new: NewWebhook) -> Result<Webhook, DbError> {
        let webhook = sqlx::query_as(
            r"
            INSERT INTO webhooks
                (tenant_id, name, url, secret, events, filters, retry_count, timeout_seconds)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            ",
        )
        .bind(new.tenant_id)
        .bind(&new.name)
        .bind(&new.url)
        .bind(&new.secret)
        .bind(&new.events)
        .bind(&new.filters)
        .bind(new.retry_count)
        .bind(new.timeout_seconds)
        .fetch_one(&self.pool)
        .await?;

        Ok(webhook)
    }

    async fn find_webhook(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Webhook>, DbError> {
        let webhook = sqlx::query_as(
            r"
            SELECT * FROM webhooks
            WHERE id = $1 AND tenant_id = $2
            ",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(webhook)
    }

    async fn find_webhook_any_tenant(&self, id: Uuid) -> Result<Option<Webhook>, DbError> {
        let webhook = sqlx::query_as(
            r"
            SELECT * FROM webhooks
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(webhook)
    }

    async fn list_webhooks(&self, tenant_id: Uuid) -> Result<Vec<Webhook>, DbError> {
        let webhooks = sqlx::query_as(
            r"
            SELECT * FROM webhooks
            WHERE tenant_id = $1
            ORDER BY created_at DESC
            ",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(webhooks)
    }

    async fn update_webhook(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        update: WebhookUpdate,
    ) -> Result<Option<Webhook>, DbError> {
        let replace_filters = update.filters.is_some();
        let filters = update.filters.flatten();

        let webhook = sqlx::query_as(
            r"
            UPDATE webhooks
            SET name = COALESCE($3, name),
                url = COALESCE($4, url),
                events = COALESCE($5, events),
                filters = CASE WHEN $6 THEN $7 ELSE filters END,
                is_active = COALESCE($8, is_active),
                retry_count = COALESCE($9, retry_count),
                timeout_seconds = COALESCE($10, timeout_seconds),
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            ",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(update.name)
        .bind(update.url)
        .bind(update.events)
        .bind(replace_filters)
        .bind(filters)
        .bind(update.is_active)
        .bind(update.retry_count)
        .bind(update.timeout_seconds)
        .fetch_optional(&self.pool)
        .await?;

        Ok(webhook)
    }

    async fn delete_webhook(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query(
            r"
            DELETE FROM webhooks
            WHERE id = $1 AND tenant_id = $2
            ",
        )
        .bind(id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_webhook_secret(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        secret: &str,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            r"
            UPDATE webhooks
            SET secret = $3, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            ",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(secret)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_active_by_event(
        &self,
        event: &str,
        tenant_id: Option<Uuid>,
    ) -> Result<Vec<Webhook>, DbError> {
        let webhooks = if let Some(tenant_id) = tenant_id {
            sqlx::query_as(
                r"
                SELECT * FROM webhooks
                WHERE is_active = TRUE AND $1 = ANY(events) AND tenant_id = $2
                ORDER BY created_at
                ",
            )
            .bind(event)
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as(
                r"
                SELECT * FROM webhooks
                WHERE is_active = TRUE AND $1 = ANY(events)
                ORDER BY created_at
                ",
            )
            .bind(event)
            .fetch_all(&self.pool)
            .await?
        };

        Ok(webhooks)
    }

    async fn record_delivery_outcome(
        &self,
        webhook_id: Uuid,
        success: bool,
        status_label: &str,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"
            UPDATE webhooks
            SET total_deliveries = total_deliveries + 1,
                successful_deliveries = successful_deliveries + CASE WHEN $2 THEN 1 ELSE 0 END,
                failed_deliveries = failed_deliveries + CASE WHEN $2 THEN 0 ELSE 1 END,
                last_delivery_at = NOW(),
                last_delivery_status = $3,
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(webhook_id)
        .bind(success)
        .bind(status_label)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_delivery(
        &self,
        new: NewWebhookDelivery,
    ) -> Result<WebhookDelivery, DbError> {
        let delivery = sqlx::query_as(
            r"
            INSERT INTO webhook_deliveries
                (webhook_id, event_type, payload, status, attempt_number)
            VALUES ($1, $2, $3, 'pending', $4)
            RETURNING *
            ",
        )
        .bind(new.webhook_id)
        .bind(&new.event_type)
        .bind(&new.payload)
        .bind(new.attempt_number)
        .fetch_one(&self.pool)
        .await?;

        Ok(delivery)
    }

    async fn begin_delivery_attempt(
        &self,
        delivery_id: Uuid,
        event_type: &str,
        payload: &serde_json::Value,
        attempt_number: i32,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"
            UPDATE webhook_deliveries
            SET event_type = $2,
                payload = $3,
                status = 'pending',
                attempt_number = $4,
                next_retry_at = NULL,
                error_message = NULL,
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(delivery_id)
        .bind(event_type)
        .bind(payload)
        .bind(attempt_number)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn finish_delivery_attempt(
        &self,
        delivery_id: Uuid,
        outcome: DeliveryAttemptOutcome,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"
            UPDATE webhook_deliveries
            SET status = $2,
                status_code = $3,
                response_body = $4,
                response_time_ms = $5,
                error_message = $6,
                next_retry_at = $7,
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(delivery_id)
        .bind(outcome.status.as_str())
        .bind(outcome.status_code)
        .bind(outcome.response_body)
        .bind(outcome.response_time_ms)
        .bind(outcome.error_message)
        .bind(outcome.next_retry_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_delivery(&self, id: Uuid) -> Result<Option<WebhookDelivery>, DbError> {
        let delivery = sqlx::query_as(
            r"
            SELECT * FROM webhook_deliveries
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(delivery)
    }

    async fn list_deliveries(
        &self,
        webhook_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WebhookDelivery>, DbError> {
        let deliveries = sqlx::query_as(
            r"
            SELECT * FROM webhook_deliveries
            WHERE webhook_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            ",
        )
        .bind(webhook_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(deliveries)
    }

    async fn enqueue_retry_job(&self, new: NewRetryJob) -> Result<RetryJob, DbError> {
        let job = sqlx::query_as(
            r"
            INSERT INTO webhook_retry_jobs
                (job_type, payload, scheduled_for, status, max_attempts, result)
            VALUES ($1, $2, $3, 'pending', $4, $5)
            RETURNING *
            ",
        )
        .bind(RETRY_JOB_TYPE)
        .bind(&new.payload)
        .bind(new.scheduled_for)
        .bind(new.max_attempts)
        .bind(&new.result)
        .fetch_one(&self.pool)
        .await?;

        Ok(job)
    }

    async fn due_retry_jobs(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<RetryJob>, DbError> {
        let jobs = sqlx::query_as(
            r"
            SELECT * FROM webhook_retry_jobs
            WHERE job_type = $1 AND status = 'pending' AND scheduled_for <= $2
            ORDER BY scheduled_for
            LIMIT $3
            ",
        )
        .bind(RETRY_JOB_TYPE)
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    async fn find_retry_job(&self, id: Uuid) -> Result<Option<RetryJob>, DbError> {
        let job = sqlx::query_as(
            r"
            SELECT * FROM webhook_retry_jobs
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    async fn claim_retry_job(&self, id: Uuid) -> Result<Option<RetryJob>, DbError> {
        // Conditional update: only one concurrent worker can move the job
        // out of 'pending'.
        let job = sqlx::query_as(
            r"
            UPDATE webhook_retry_jobs
            SET status = 'processing',
                attempts = attempts + 1,
                started_at = NOW(),
                error_message = NULL
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    async fn finish_retry_job(
        &self,
        id: Uuid,
        status: RetryJobStatus,
        error_message: Option<&str>,
        result: Option<serde_json::Value>,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"
            UPDATE webhook_retry_jobs
            SET status = $2,
                error_message = $3,
                result = COALESCE($4, result),
                completed_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(error_message)
        .bind(result)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
