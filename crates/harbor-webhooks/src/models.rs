//! Request, response, and wire types for the webhook system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use harbor_db::models::Webhook;

/// Event name used by connectivity test deliveries.
pub const TEST_EVENT: &str = "webhook.test";

/// JSON body delivered to webhook endpoints.
///
/// `timestamp` is the delivery time of the current attempt, not the event
/// occurrence time; retried attempts carry a fresh timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub event: String,
    pub timestamp: DateTime<Utc>,
    pub data: Value,
}

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub success: bool,
    pub status_code: Option<u16>,
    pub response_body: Option<String>,
    pub response_time_ms: i32,
    pub error: Option<String>,
}

/// Payload stored on a retry job: everything needed to re-run one delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryJobPayload {
    pub webhook_id: Uuid,
    pub event: String,
    pub data: Value,
    /// The attempt number the redelivery will run as.
    pub attempt_number: i32,
    pub delivery_id: Option<Uuid>,
}

/// Summary returned by a retry drain pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrySummary {
    /// Jobs claimed and executed by this pass.
    pub processed: usize,
    /// Jobs whose scheduled unit of work ran (delivery succeeded, or failed
    /// with retries remaining and the next job already enqueued).
    pub completed: usize,
    /// Jobs whose delivery failed with the attempt budget exhausted.
    pub failed: usize,
    /// Unexpected errors encountered while draining.
    pub errors: Vec<String>,
}

/// Parameters for registering a new webhook.
#[derive(Debug, Clone)]
pub struct RegisterWebhook {
    pub tenant_id: Uuid,
    pub name: String,
    pub url: String,
    pub events: Vec<String>,
    pub filters: Option<Value>,
    /// Maximum delivery attempts; defaults from configuration when `None`.
    pub retry_count: Option<i32>,
    /// Per-attempt timeout in seconds; defaults from configuration.
    pub timeout_seconds: Option<i32>,
}

/// A webhook as exposed by read operations. Carries no secret material.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookDetails {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub url: String,
    pub events: Vec<String>,
    pub filters: Option<Value>,
    pub is_active: bool,
    pub retry_count: i32,
    pub timeout_seconds: i32,
    pub total_deliveries: i64,
    pub successful_deliveries: i64,
    pub failed_deliveries: i64,
    pub last_delivery_at: Option<DateTime<Utc>>,
    pub last_delivery_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Webhook> for WebhookDetails {
    fn from(webhook: Webhook) -> Self {
        Self {
            id: webhook.id,
            tenant_id: webhook.tenant_id,
            name: webhook.name,
            url: webhook.url,
            events: webhook.events,
            filters: webhook.filters,
            is_active: webhook.is_active,
            retry_count: webhook.retry_count,
            timeout_seconds: webhook.timeout_seconds,
            total_deliveries: webhook.total_deliveries,
            successful_deliveries: webhook.successful_deliveries,
            failed_deliveries: webhook.failed_deliveries,
            last_delivery_at: webhook.last_delivery_at,
            last_delivery_status: webhook.last_delivery_status,
            created_at: webhook.created_at,
            updated_at: webhook.updated_at,
        }
    }
}

/// Result of webhook registration. The secret is returned here and at
/// rotation, and nowhere else.
#[derive(Debug, Clone)]
pub struct RegisteredWebhook {
    pub webhook: WebhookDetails,
    pub secret: String,
}
