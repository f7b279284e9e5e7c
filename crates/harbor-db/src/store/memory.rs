//! In-memory [`WebhookStore`] implementation.
//!
//! Backs tests and embedded single-process deployments. All operations take
//! a single mutex, which gives the same atomicity guarantees the Postgres
//! backend gets from conditional updates: a retry job claim observes and
//! changes the status in one critical section.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{
    DeliveryAttemptOutcome, NewRetryJob, NewWebhook, NewWebhookDelivery, RetryJob, RetryJobStatus,
    Webhook, WebhookDelivery, WebhookUpdate, RETRY_JOB_TYPE,
};
use crate::store::WebhookStore;

#[derive(Default)]
struct Inner {
    webhooks: HashMap<Uuid, Webhook>,
    deliveries: HashMap<Uuid, WebhookDelivery>,
    retry_jobs: HashMap<Uuid, RetryJob>,
}

/// Mutex-guarded in-memory webhook store.
#[derive(Default)]
pub struct MemoryWebhookStore {
    inner: Mutex<Inner>,
}

impl MemoryWebhookStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Lock poisoning only happens if a panic occurred mid-mutation;
        // propagate the panic rather than serve torn state.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl WebhookStore for MemoryWebhookStore {
    async fn insert_webhook(&self, new: NewWebhook) -> Result<Webhook, DbError> {
        let now = Utc::now();
        let webhook = Webhook {
            id: Uuid::new_v4(),
            tenant_id: new.tenant_id,
            name: new.name,
            url: new.url,
            secret: new.secret,
            events: new.events,
            filters: new.filters,
            is_active: true,
            retry_count: new.retry_count,
            timeout_seconds: new.timeout_seconds,
            total_deliveries: 0,
            successful_deliveries: 0,
            failed_deliveries: 0,
            last_delivery_at: None,
            last_delivery_status: None,
            created_at: now,
            updated_at: now,
        };

        self.lock().webhooks.insert(webhook.id, webhook.clone());
        Ok(webhook)
    }

    async fn find_webhook(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Webhook>, DbError> {
        Ok(self
            .lock()
            .webhooks
            .get(&id)
            .filter(|w| w.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_webhook_any_tenant(&self, id: Uuid) -> Result<Option<Webhook>, DbError> {
        Ok(self.lock().webhooks.get(&id).cloned())
    }

    async fn list_webhooks(&self, tenant_id: Uuid) -> Result<Vec<Webhook>, DbError> {
        let mut webhooks: Vec<Webhook> = self
            .lock()
            .webhooks
            .values()
            .filter(|w| w.tenant_id == tenant_id)
            .cloned()
            .collect();
        webhooks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(webhooks)
    }

    async fn update_webhook(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        update: WebhookUpdate,
    ) -> Result<Option<Webhook>, DbError> {
        let mut inner = self.lock();
        let Some(webhook) = inner
            .webhooks
            .get_mut(&id)
            .filter(|w| w.tenant_id == tenant_id)
        else {
            return Ok(None);
        };

        if let Some(name) = update.name {
            webhook.name = name;
        }
        if let Some(url) = update.url {
            webhook.url = url;
        }
        if let Some(events) = update.events {
            webhook.events = events;
        }
        if let Some(filters) = update.filters {
            webhook.filters = filters;
        }
        if let Some(is_active) = update.is_active {
            webhook.is_active = is_active;
        }
        if let Some(retry_count) = update.retry_count {
            webhook.retry_count = retry_count;
        }
        if let Some(timeout_seconds) = update.timeout_seconds {
            webhook.timeout_seconds = timeout_seconds;
        }
        webhook.updated_at = Utc::now();

        Ok(Some(webhook.clone()))
    }

    async fn delete_webhook(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, DbError> {
        let mut inner = self.lock();
        let exists = inner
            .webhooks
            .get(&id)
            .is_some_and(|w| w.tenant_id == tenant_id);
        if exists {
            inner.webhooks.remove(&id);
        }
        Ok(exists)
    }

    async fn update_webhook_secret(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        secret: &str,
    ) -> Result<bool, DbError> {
        let mut inner = self.lock();
        let Some(webhook) = inner
            .webhooks
            .get_mut(&id)
            .filter(|w| w.tenant_id == tenant_id)
        else {
            return Ok(false);
        };
        webhook.secret = secret.to_string();
        webhook.updated_at = Utc::now();
        Ok(true)
    }

    async fn find_active_by_event(
        &self,
        event: &str,
        tenant_id: Option<Uuid>,
    ) -> Result<Vec<Webhook>, DbError> {
        let mut webhooks: Vec<Webhook> = self
            .lock()
            .webhooks
            .values()
            .filter(|w| w.is_active && w.events.iter().any(|e| e == event))
            .filter(|w| tenant_id.map_or(true, |t| w.tenant_id == t))
            .cloned()
            .collect();
        webhooks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(webhooks)
    }

    async fn record_delivery_outcome(
        &self,
        webhook_id: Uuid,
        success: bool,
        status_label: &str,
    ) -> Result<(), DbError> {
        let mut inner = self.lock();
        if let Some(webhook) = inner.webhooks.get_mut(&webhook_id) {
            webhook.total_deliveries += 1;
            if success {
                webhook.successful_deliveries += 1;
            } else {
                webhook.failed_deliveries += 1;
            }
            webhook.last_delivery_at = Some(Utc::now());
            webhook.last_delivery_status = Some(status_label.to_string());
            webhook.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn insert_delivery(
        &self,
        new: NewWebhookDelivery,
    ) -> Result<WebhookDelivery, DbError> {
        let now = Utc::now();
        let delivery = WebhookDelivery {
            id: Uuid::new_v4(),
            webhook_id: new.webhook_id,
            event_type: new.event_type,
            payload: new.payload,
            status: "pending".to_string(),
            attempt_number: new.attempt_number,
            status_code: None,
            response_body: None,
            response_time_ms: None,
            next_retry_at: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };

        self.lock().deliveries.insert(delivery.id, delivery.clone());
        Ok(delivery)
    }

    async fn begin_delivery_attempt(
        &self,
        delivery_id: Uuid,
        event_type: &str,
        payload: &serde_json::Value,
        attempt_number: i32,
    ) -> Result<(), DbError> {
        let mut inner = self.lock();
        if let Some(delivery) = inner.deliveries.get_mut(&delivery_id) {
            delivery.event_type = event_type.to_string();
            delivery.payload = payload.clone();
            delivery.status = "pending".to_string();
            delivery.attempt_number = attempt_number;
            delivery.next_retry_at = None;
            delivery.error_message = None;
            delivery.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn finish_delivery_attempt(
        &self,
        delivery_id: Uuid,
        outcome: DeliveryAttemptOutcome,
    ) -> Result<(), DbError> {
        let mut inner = self.lock();
        if let Some(delivery) = inner.deliveries.get_mut(&delivery_id) {
            delivery.status = outcome.status.as_str().to_string();
            delivery.status_code = outcome.status_code;
            delivery.response_body = outcome.response_body;
            delivery.response_time_ms = outcome.response_time_ms;
            delivery.error_message = outcome.error_message;
            delivery.next_retry_at = outcome.next_retry_at;
            delivery.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn find_delivery(&self, id: Uuid) -> Result<Option<WebhookDelivery>, DbError> {
        Ok(self.lock().deliveries.get(&id).cloned())
    }

    async fn list_deliveries(
        &self,
        webhook_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WebhookDelivery>, DbError> {
        let mut deliveries: Vec<WebhookDelivery> = self
            .lock()
            .deliveries
            .values()
            .filter(|d| d.webhook_id == webhook_id)
            .cloned()
            .collect();
        deliveries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        deliveries.truncate(limit.max(0) as usize);
        Ok(deliveries)
    }

    async fn enqueue_retry_job(&self, new: NewRetryJob) -> Result<RetryJob, DbError> {
        let job = RetryJob {
            id: Uuid::new_v4(),
            job_type: RETRY_JOB_TYPE.to_string(),
            payload: new.payload,
            scheduled_for: new.scheduled_for,
            status: "pending".to_string(),
            attempts: 0,
            max_attempts: new.max_attempts,
            result: new.result,
            error_message: None,
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
        };

        self.lock().retry_jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn due_retry_jobs(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<RetryJob>, DbError> {
        let mut jobs: Vec<RetryJob> = self
            .lock()
            .retry_jobs
            .values()
            .filter(|j| j.job_type == RETRY_JOB_TYPE && j.status == "pending")
            .filter(|j| j.scheduled_for <= now)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.scheduled_for.cmp(&b.scheduled_for));
        jobs.truncate(limit.max(0) as usize);
        Ok(jobs)
    }

    async fn find_retry_job(&self, id: Uuid) -> Result<Option<RetryJob>, DbError> {
        Ok(self.lock().retry_jobs.get(&id).cloned())
    }

    async fn claim_retry_job(&self, id: Uuid) -> Result<Option<RetryJob>, DbError> {
        let mut inner = self.lock();
        let Some(job) = inner.retry_jobs.get_mut(&id) else {
            return Ok(None);
        };
        if job.status != "pending" {
            return Ok(None);
        }
        job.status = "processing".to_string();
        job.attempts += 1;
        job.started_at = Some(Utc::now());
        job.error_message = None;
        Ok(Some(job.clone()))
    }

    async fn finish_retry_job(
        &self,
        id: Uuid,
        status: RetryJobStatus,
        error_message: Option<&str>,
        result: Option<serde_json::Value>,
    ) -> Result<(), DbError> {
        let mut inner = self.lock();
        if let Some(job) = inner.retry_jobs.get_mut(&id) {
            job.status = status.as_str().to_string();
            job.error_message = error_message.map(String::from);
            if result.is_some() {
                job.result = result;
            }
            job.completed_at = Some(Utc::now());
        }
        Ok(())
    }
}
