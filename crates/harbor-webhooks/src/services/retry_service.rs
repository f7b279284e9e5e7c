//! Durable retry scheduling and draining.
//!
//! Failed deliveries with remaining budget become persisted retry jobs.
//! A drain pass ([`RetryScheduler::process_retry_jobs`]) claims due jobs
//! with an atomic conditional update and re-runs them through the delivery
//! worker, which makes it safe to run any number of scheduler instances
//! concurrently without a distributed lock manager.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::time::interval;
use uuid::Uuid;

use harbor_db::models::{
    DeliveryAttemptOutcome, DeliveryStatus, NewRetryJob, RetryJob, RetryJobStatus, Webhook,
};
use harbor_db::WebhookStore;

use crate::backoff::BackoffPolicy;
use crate::config::WebhooksConfig;
use crate::error::WebhookError;
use crate::models::{RetryJobPayload, RetrySummary};
use crate::services::delivery_service::DeliveryService;

/// Enqueue a retry job for a failed delivery attempt.
///
/// Computes the delay from the backoff policy, inserts a job scheduled for
/// `now + delay` carrying everything needed to redeliver, and returns the
/// scheduled time so the caller can stamp the delivery record.
pub async fn schedule_retry(
    store: &dyn WebhookStore,
    backoff: &dyn BackoffPolicy,
    webhook: &Webhook,
    event: &str,
    data: &serde_json::Value,
    failed_attempt: i32,
    delivery_id: Uuid,
) -> Result<chrono::DateTime<Utc>, WebhookError> {
    let delay = backoff.delay(failed_attempt.max(0) as u32);
    let scheduled_for = Utc::now() + chrono::Duration::seconds(delay.as_secs() as i64);

    let payload = RetryJobPayload {
        webhook_id: webhook.id,
        event: event.to_string(),
        data: data.clone(),
        attempt_number: failed_attempt + 1,
        delivery_id: Some(delivery_id),
    };

    let job = store
        .enqueue_retry_job(NewRetryJob {
            payload: serde_json::to_value(&payload)
                .map_err(|e| WebhookError::Internal(format!("Failed to encode job payload: {e}")))?,
            scheduled_for,
            max_attempts: webhook.retry_count,
            result: Some(json!({ "scheduled_from": "delivery" })),
        })
        .await?;

    tracing::info!(
        target: "webhook_delivery",
        job_id = %job.id,
        webhook_id = %webhook.id,
        delivery_id = %delivery_id,
        next_attempt = failed_attempt + 1,
        scheduled_for = %scheduled_for,
        "Scheduled webhook retry"
    );

    Ok(scheduled_for)
}

/// Drains due retry jobs and re-executes them through the delivery worker.
pub struct RetryScheduler {
    store: Arc<dyn WebhookStore>,
    delivery: Arc<DeliveryService>,
    drain_batch_size: i64,
    shutdown: Arc<AtomicBool>,
}

impl RetryScheduler {
    /// Create a scheduler over the shared store and delivery worker.
    #[must_use]
    pub fn new(
        store: Arc<dyn WebhookStore>,
        delivery: Arc<DeliveryService>,
        config: &WebhooksConfig,
    ) -> Self {
        Self {
            store,
            delivery,
            drain_batch_size: config.drain_batch_size,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Process up to `limit` due retry jobs.
    ///
    /// Jobs are claimed with an atomic `pending → processing` transition; a
    /// job already claimed by a concurrent instance is skipped, not an
    /// error. Returns per-pass accounting.
    pub async fn process_retry_jobs(&self, limit: i64) -> RetrySummary {
        let mut summary = RetrySummary::default();

        let jobs = match self.store.due_retry_jobs(Utc::now(), limit).await {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!(
                    target: "webhook_delivery",
                    error = %e,
                    "Failed to query due retry jobs"
                );
                summary.errors.push(format!("Failed to query due jobs: {e}"));
                return summary;
            }
        };

        for job in jobs {
            let claimed = match self.store.claim_retry_job(job.id).await {
                Ok(Some(claimed)) => claimed,
                Ok(None) => {
                    // Lost the claim race to a concurrent scheduler instance.
                    tracing::debug!(
                        target: "webhook_delivery",
                        job_id = %job.id,
                        "Retry job already claimed, skipping"
                    );
                    continue;
                }
                Err(e) => {
                    summary
                        .errors
                        .push(format!("Failed to claim job {}: {e}", job.id));
                    continue;
                }
            };

            summary.processed += 1;
            self.execute_job(claimed, &mut summary).await;
        }

        summary
    }

    async fn execute_job(&self, job: RetryJob, summary: &mut RetrySummary) {
        let payload: RetryJobPayload = match serde_json::from_value(job.payload.clone()) {
            Ok(payload) => payload,
            Err(e) => {
                self.fail_job(&job, &format!("Missing or malformed payload: {e}"), None)
                    .await;
                summary.failed += 1;
                return;
            }
        };

        let webhook = match self
            .store
            .find_webhook_any_tenant(payload.webhook_id)
            .await
        {
            Ok(Some(webhook)) if webhook.is_active => webhook,
            Ok(Some(_)) => {
                self.fail_job(&job, "Webhook disabled", payload.delivery_id)
                    .await;
                summary.failed += 1;
                return;
            }
            Ok(None) => {
                self.fail_job(&job, "Webhook not found for retry", payload.delivery_id)
                    .await;
                summary.failed += 1;
                return;
            }
            Err(e) => {
                self.fail_job(
                    &job,
                    &format!("Failed to load webhook for retry: {e}"),
                    None,
                )
                .await;
                summary.failed += 1;
                summary
                    .errors
                    .push(format!("Failed to load webhook for job {}: {e}", job.id));
                return;
            }
        };

        let result = self
            .delivery
            .deliver(
                &webhook,
                &payload.event,
                &payload.data,
                payload.attempt_number,
                payload.delivery_id,
            )
            .await;

        // "Completed" means this scheduled unit of work ran; a failed
        // delivery with budget remaining has already enqueued the next job.
        let final_attempt = payload.attempt_number >= webhook.retry_count;
        let status = if result.success || !final_attempt {
            RetryJobStatus::Completed
        } else {
            RetryJobStatus::Failed
        };

        if let Err(e) = self
            .store
            .finish_retry_job(
                job.id,
                status,
                if result.success {
                    None
                } else {
                    result.error.as_deref()
                },
                serde_json::to_value(&result).ok(),
            )
            .await
        {
            tracing::error!(
                target: "webhook_delivery",
                job_id = %job.id,
                error = %e,
                "Failed to finalize retry job"
            );
            summary
                .errors
                .push(format!("Failed to finalize job {}: {e}", job.id));
        }

        if result.success || !final_attempt {
            summary.completed += 1;
        } else {
            summary.failed += 1;
        }
    }

    /// Mark a claimed job failed; when the job still references a live
    /// delivery chain, close that chain out too.
    async fn fail_job(&self, job: &RetryJob, message: &str, delivery_id: Option<Uuid>) {
        tracing::warn!(
            target: "webhook_delivery",
            job_id = %job.id,
            error = %message,
            "Retry job failed without executing a delivery"
        );

        if let Err(e) = self
            .store
            .finish_retry_job(job.id, RetryJobStatus::Failed, Some(message), None)
            .await
        {
            tracing::error!(
                target: "webhook_delivery",
                job_id = %job.id,
                error = %e,
                "Failed to mark retry job failed"
            );
        }

        if let Some(delivery_id) = delivery_id {
            if let Err(e) = self
                .store
                .finish_delivery_attempt(
                    delivery_id,
                    DeliveryAttemptOutcome {
                        status: DeliveryStatus::Failed,
                        status_code: None,
                        response_body: None,
                        response_time_ms: None,
                        error_message: Some(message.to_string()),
                        next_retry_at: None,
                    },
                )
                .await
            {
                tracing::error!(
                    target: "webhook_delivery",
                    delivery_id = %delivery_id,
                    error = %e,
                    "Failed to close delivery chain for dead retry job"
                );
            }
        }
    }

    /// Run the drain loop until shutdown, polling at `poll_interval`.
    ///
    /// Multiple instances of this loop may run concurrently (including in
    /// separate processes); the atomic claim keeps them from executing the
    /// same job twice.
    pub async fn run(&self, poll_interval: Duration) {
        tracing::info!(
            target: "webhook_delivery",
            poll_interval_secs = poll_interval.as_secs(),
            drain_batch_size = self.drain_batch_size,
            "Starting retry scheduler"
        );

        let mut ticker = interval(poll_interval);
        loop {
            ticker.tick().await;
            if self.shutdown.load(Ordering::Relaxed) {
                tracing::info!(
                    target: "webhook_delivery",
                    "Retry scheduler shutdown requested, stopping"
                );
                break;
            }

            let summary = self.process_retry_jobs(self.drain_batch_size).await;
            if summary.processed > 0 || !summary.errors.is_empty() {
                tracing::info!(
                    target: "webhook_delivery",
                    processed = summary.processed,
                    completed = summary.completed,
                    failed = summary.failed,
                    error_count = summary.errors.len(),
                    "Retry drain pass finished"
                );
            }
        }
    }

    /// Request graceful shutdown of the drain loop.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}
