//! Webhook delivery execution service.
//!
//! Performs one HTTP delivery attempt for one webhook/event pair: persists
//! the delivery record to `pending` before sending, signs the exact
//! serialized body, posts with a per-webhook timeout, records the outcome,
//! bumps the webhook's aggregate counters, and hands failed attempts with
//! remaining budget to the retry scheduler.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use uuid::Uuid;

use harbor_db::models::{
    DeliveryAttemptOutcome, DeliveryStatus, NewWebhookDelivery, Webhook,
};
use harbor_db::WebhookStore;

use crate::backoff::BackoffPolicy;
use crate::config::WebhooksConfig;
use crate::crypto;
use crate::error::WebhookError;
use crate::models::{DeliveryResult, WebhookPayload, TEST_EVENT};
use crate::services::retry_service;

/// Service for webhook delivery operations.
#[derive(Clone)]
pub struct DeliveryService {
    store: Arc<dyn WebhookStore>,
    http_client: Client,
    backoff: Arc<dyn BackoffPolicy>,
    response_body_limit: usize,
}

impl DeliveryService {
    /// Create a new delivery service with a shared HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::Internal` if the HTTP client cannot be built.
    pub fn new(
        store: Arc<dyn WebhookStore>,
        config: &WebhooksConfig,
    ) -> Result<Self, WebhookError> {
        let http_client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| WebhookError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            store,
            http_client,
            backoff: config.backoff_policy(),
            response_body_limit: config.response_body_limit,
        })
    }

    /// Replace the backoff policy.
    #[must_use]
    pub fn with_backoff(mut self, policy: Arc<dyn BackoffPolicy>) -> Self {
        self.backoff = policy;
        self
    }

    /// Execute one delivery attempt for a webhook/event pair.
    ///
    /// `delivery_id` is `None` on the first attempt (a new record is
    /// created) and carries the existing chain id on retries. Failures are
    /// recorded, never propagated: the result is always returned.
    pub async fn deliver(
        &self,
        webhook: &Webhook,
        event: &str,
        data: &Value,
        attempt_number: i32,
        delivery_id: Option<Uuid>,
    ) -> DeliveryResult {
        self.attempt(webhook, event, data, attempt_number, delivery_id, true)
            .await
    }

    /// Connectivity check: a synchronous, single-attempt delivery of a
    /// synthetic `webhook.test` payload. Bypasses filters and never
    /// schedules retries; the attempt is still recorded for audit.
    pub async fn test_webhook(&self, webhook_id: Uuid) -> Result<DeliveryResult, WebhookError> {
        let webhook = self
            .store
            .find_webhook_any_tenant(webhook_id)
            .await?
            .ok_or(WebhookError::WebhookNotFound)?;

        let data = serde_json::json!({
            "test": true,
            "timestamp": Utc::now(),
        });

        Ok(self
            .attempt(&webhook, TEST_EVENT, &data, 1, None, false)
            .await)
    }

    async fn attempt(
        &self,
        webhook: &Webhook,
        event: &str,
        data: &Value,
        attempt_number: i32,
        delivery_id: Option<Uuid>,
        schedule_retries: bool,
    ) -> DeliveryResult {
        // Canonical payload with the delivery time of this attempt.
        let payload = WebhookPayload {
            event: event.to_string(),
            timestamp: Utc::now(),
            data: data.clone(),
        };

        let payload_value = match serde_json::to_value(&payload) {
            Ok(v) => v,
            Err(e) => {
                return self
                    .give_up(webhook, &format!("Failed to serialize payload: {e}"))
                    .await;
            }
        };
        let body = match serde_json::to_vec(&payload_value) {
            Ok(b) => b,
            Err(e) => {
                return self
                    .give_up(webhook, &format!("Failed to serialize payload: {e}"))
                    .await;
            }
        };

        // Persist the pending state before sending, so a crash mid-flight
        // leaves an auditable record rather than silence.
        let delivery_id = match delivery_id {
            Some(id) => {
                if let Err(e) = self
                    .store
                    .begin_delivery_attempt(id, event, &payload_value, attempt_number)
                    .await
                {
                    return self
                        .give_up(webhook, &format!("Failed to update delivery record: {e}"))
                        .await;
                }
                id
            }
            None => {
                match self
                    .store
                    .insert_delivery(NewWebhookDelivery {
                        webhook_id: webhook.id,
                        event_type: event.to_string(),
                        payload: payload_value.clone(),
                        attempt_number,
                    })
                    .await
                {
                    Ok(delivery) => delivery.id,
                    Err(e) => {
                        return self
                            .give_up(webhook, &format!("Failed to create delivery record: {e}"))
                            .await;
                    }
                }
            }
        };

        let signature = crypto::sign(&body, &webhook.secret);
        let timeout_secs = webhook.timeout_seconds.max(1) as u64;

        let start = Instant::now();
        let result = self
            .http_client
            .post(&webhook.url)
            .header("Content-Type", "application/json")
            .header("X-Webhook-Signature", &signature)
            .header("X-Webhook-Event", event)
            .timeout(Duration::from_secs(timeout_secs))
            .body(body)
            .send()
            .await;
        let response_time_ms = start.elapsed().as_millis() as i32;

        match result {
            Ok(response) => {
                let status_code = response.status().as_u16();
                let response_body: String = response
                    .text()
                    .await
                    .unwrap_or_default()
                    .chars()
                    .take(self.response_body_limit)
                    .collect();

                if (200..300).contains(&status_code) {
                    self.record_success(
                        webhook,
                        delivery_id,
                        status_code,
                        response_body,
                        response_time_ms,
                    )
                    .await
                } else {
                    self.record_failure(
                        webhook,
                        event,
                        data,
                        attempt_number,
                        delivery_id,
                        Some(status_code),
                        Some(response_body),
                        response_time_ms,
                        format!("HTTP {status_code}"),
                        schedule_retries,
                    )
                    .await
                }
            }
            Err(e) => {
                let error_message = if e.is_timeout() {
                    format!("Request timed out after {timeout_secs}s")
                } else if e.is_connect() {
                    format!("Connection failed: {e}")
                } else {
                    format!("Request error: {e}")
                };

                self.record_failure(
                    webhook,
                    event,
                    data,
                    attempt_number,
                    delivery_id,
                    None,
                    None,
                    response_time_ms,
                    error_message,
                    schedule_retries,
                )
                .await
            }
        }
    }

    async fn record_success(
        &self,
        webhook: &Webhook,
        delivery_id: Uuid,
        status_code: u16,
        response_body: String,
        response_time_ms: i32,
    ) -> DeliveryResult {
        tracing::info!(
            target: "webhook_delivery",
            delivery_id = %delivery_id,
            webhook_id = %webhook.id,
            tenant_id = %webhook.tenant_id,
            status_code,
            response_time_ms,
            "Webhook delivery succeeded"
        );

        if let Err(e) = self
            .store
            .finish_delivery_attempt(
                delivery_id,
                DeliveryAttemptOutcome {
                    status: DeliveryStatus::Success,
                    status_code: Some(status_code as i16),
                    response_body: Some(response_body.clone()),
                    response_time_ms: Some(response_time_ms),
                    error_message: None,
                    next_retry_at: None,
                },
            )
            .await
        {
            tracing::error!(
                target: "webhook_delivery",
                delivery_id = %delivery_id,
                error = %e,
                "Failed to update delivery record to success"
            );
        }

        self.record_stats(webhook, true, &status_code.to_string())
            .await;

        DeliveryResult {
            success: true,
            status_code: Some(status_code),
            response_body: Some(response_body),
            response_time_ms,
            error: None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_failure(
        &self,
        webhook: &Webhook,
        event: &str,
        data: &Value,
        attempt_number: i32,
        delivery_id: Uuid,
        status_code: Option<u16>,
        response_body: Option<String>,
        response_time_ms: i32,
        error_message: String,
        schedule_retries: bool,
    ) -> DeliveryResult {
        let budget_remaining = attempt_number < webhook.retry_count;
        let will_retry = schedule_retries && budget_remaining;

        tracing::warn!(
            target: "webhook_delivery",
            delivery_id = %delivery_id,
            webhook_id = %webhook.id,
            tenant_id = %webhook.tenant_id,
            event_type = %event,
            attempt_number,
            error = %error_message,
            will_retry,
            "Webhook delivery failed"
        );

        // Schedule the next attempt first so the record can carry its
        // timestamp; fall through to a terminal failure if scheduling is
        // impossible.
        let next_retry_at = if will_retry {
            match retry_service::schedule_retry(
                &*self.store,
                &*self.backoff,
                webhook,
                event,
                data,
                attempt_number,
                delivery_id,
            )
            .await
            {
                Ok(scheduled_for) => Some(scheduled_for),
                Err(e) => {
                    tracing::error!(
                        target: "webhook_delivery",
                        delivery_id = %delivery_id,
                        error = %e,
                        "Failed to schedule retry; marking delivery failed"
                    );
                    None
                }
            }
        } else {
            None
        };

        let status = if next_retry_at.is_some() {
            DeliveryStatus::Retrying
        } else {
            DeliveryStatus::Failed
        };

        if let Err(e) = self
            .store
            .finish_delivery_attempt(
                delivery_id,
                DeliveryAttemptOutcome {
                    status,
                    status_code: status_code.map(|c| c as i16),
                    response_body: response_body.clone(),
                    response_time_ms: Some(response_time_ms),
                    error_message: Some(error_message.clone()),
                    next_retry_at,
                },
            )
            .await
        {
            tracing::error!(
                target: "webhook_delivery",
                delivery_id = %delivery_id,
                error = %e,
                "Failed to update delivery record after failed attempt"
            );
        }

        let status_label = status_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "error".to_string());
        self.record_stats(webhook, false, &status_label).await;

        DeliveryResult {
            success: false,
            status_code,
            response_body,
            response_time_ms,
            error: Some(error_message),
        }
    }

    /// Failure before any HTTP attempt could be made (serialization or
    /// record persistence). Nothing to retry: the payload would fail again.
    async fn give_up(&self, webhook: &Webhook, error_message: &str) -> DeliveryResult {
        tracing::error!(
            target: "webhook_delivery",
            webhook_id = %webhook.id,
            error = %error_message,
            "Webhook delivery aborted before send"
        );

        self.record_stats(webhook, false, "error").await;

        DeliveryResult {
            success: false,
            status_code: None,
            response_body: None,
            response_time_ms: 0,
            error: Some(error_message.to_string()),
        }
    }

    async fn record_stats(&self, webhook: &Webhook, success: bool, status_label: &str) {
        if let Err(e) = self
            .store
            .record_delivery_outcome(webhook.id, success, status_label)
            .await
        {
            tracing::error!(
                target: "webhook_delivery",
                webhook_id = %webhook.id,
                error = %e,
                "Failed to update webhook delivery counters"
            );
        }
    }

    /// Get a reference to the store (shared by the scheduler and worker).
    #[must_use]
    pub fn store(&self) -> &Arc<dyn WebhookStore> {
        &self.store
    }
}
