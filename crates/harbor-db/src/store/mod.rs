//! Storage abstraction for the webhook delivery pipeline.
//!
//! Domain services are written against [`WebhookStore`] and receive an
//! implementation at construction time, so tests can substitute the
//! in-memory backend and multiple configurations can coexist in one process.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{
    DeliveryAttemptOutcome, NewRetryJob, NewWebhook, NewWebhookDelivery, RetryJob, RetryJobStatus,
    Webhook, WebhookDelivery, WebhookUpdate,
};

/// Persistence operations used by the webhook registry, dispatcher, delivery
/// worker, and retry scheduler.
#[async_trait]
pub trait WebhookStore: Send + Sync {
    // --- Webhooks ---

    /// Insert a new webhook subscription.
    async fn insert_webhook(&self, new: NewWebhook) -> Result<Webhook, DbError>;

    /// Find a webhook within a tenant.
    async fn find_webhook(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Webhook>, DbError>;

    /// Find a webhook by id regardless of tenant (delivery/retry paths).
    async fn find_webhook_any_tenant(&self, id: Uuid) -> Result<Option<Webhook>, DbError>;

    /// List a tenant's webhooks, newest first.
    async fn list_webhooks(&self, tenant_id: Uuid) -> Result<Vec<Webhook>, DbError>;

    /// Apply a partial update; returns the updated webhook, or `None` if it
    /// does not exist in the tenant.
    async fn update_webhook(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        update: WebhookUpdate,
    ) -> Result<Option<Webhook>, DbError>;

    /// Delete a webhook. Returns whether a row was removed.
    async fn delete_webhook(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, DbError>;

    /// Atomically replace the signing secret. Returns whether the webhook
    /// exists.
    async fn update_webhook_secret(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        secret: &str,
    ) -> Result<bool, DbError>;

    /// Active webhooks subscribed to `event`, optionally tenant-scoped.
    async fn find_active_by_event(
        &self,
        event: &str,
        tenant_id: Option<Uuid>,
    ) -> Result<Vec<Webhook>, DbError>;

    /// Atomically bump the webhook's aggregate delivery counters and stamp
    /// the last-delivery fields. The increment happens storage-side; there
    /// is no read-modify-write path.
    async fn record_delivery_outcome(
        &self,
        webhook_id: Uuid,
        success: bool,
        status_label: &str,
    ) -> Result<(), DbError>;

    // --- Delivery records ---

    /// Create a delivery record in `pending` for a first attempt.
    async fn insert_delivery(&self, new: NewWebhookDelivery)
        -> Result<WebhookDelivery, DbError>;

    /// Reset an existing record to `pending` for a subsequent attempt:
    /// refreshes the payload snapshot, bumps the attempt number, clears the
    /// retry timestamp and error.
    async fn begin_delivery_attempt(
        &self,
        delivery_id: Uuid,
        event_type: &str,
        payload: &serde_json::Value,
        attempt_number: i32,
    ) -> Result<(), DbError>;

    /// Record the outcome of an attempt on the delivery record.
    async fn finish_delivery_attempt(
        &self,
        delivery_id: Uuid,
        outcome: DeliveryAttemptOutcome,
    ) -> Result<(), DbError>;

    /// Find a delivery record by id.
    async fn find_delivery(&self, id: Uuid) -> Result<Option<WebhookDelivery>, DbError>;

    /// Delivery history for a webhook, newest first.
    async fn list_deliveries(
        &self,
        webhook_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WebhookDelivery>, DbError>;

    // --- Retry jobs ---

    /// Enqueue a retry job.
    async fn enqueue_retry_job(&self, new: NewRetryJob) -> Result<RetryJob, DbError>;

    /// Pending jobs due at `now`, ordered by scheduled time.
    async fn due_retry_jobs(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<RetryJob>, DbError>;

    /// Atomically claim a job: `pending` → `processing` with an attempt
    /// increment. Returns `None` when another worker already claimed it;
    /// this conditional update is what makes concurrent scheduler instances
    /// safe without a lock manager.
    async fn claim_retry_job(&self, id: Uuid) -> Result<Option<RetryJob>, DbError>;

    /// Find a retry job by id (audit and operational reads).
    async fn find_retry_job(&self, id: Uuid) -> Result<Option<RetryJob>, DbError>;

    /// Finish a claimed job with a terminal status and result snapshot.
    async fn finish_retry_job(
        &self,
        id: Uuid,
        status: RetryJobStatus,
        error_message: Option<&str>,
        result: Option<serde_json::Value>,
    ) -> Result<(), DbError>;
}
