//! Webhook subscription model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A tenant-owned webhook subscription.
///
/// Holds the signing secret and the running delivery counters. The secret is
/// internal to the delivery pipeline; read APIs expose webhooks through a
/// response type that omits it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Webhook {
    /// Unique webhook identifier.
    pub id: Uuid,

    /// Owning tenant.
    pub tenant_id: Uuid,

    /// Display name.
    pub name: String,

    /// Delivery target URL (http or https).
    pub url: String,

    /// Hex-encoded HMAC signing secret, generated server-side.
    pub secret: String,

    /// Subscribed event names (non-empty).
    pub events: Vec<String>,

    /// Optional filter spec restricting which event occurrences deliver.
    pub filters: Option<serde_json::Value>,

    /// Whether the webhook receives deliveries.
    pub is_active: bool,

    /// Maximum delivery attempts per event occurrence.
    pub retry_count: i32,

    /// Per-attempt HTTP timeout in seconds.
    pub timeout_seconds: i32,

    /// Total delivery attempts made.
    pub total_deliveries: i64,

    /// Attempts that received a 2xx response.
    pub successful_deliveries: i64,

    /// Attempts that failed.
    pub failed_deliveries: i64,

    /// When the most recent attempt finished.
    pub last_delivery_at: Option<DateTime<Utc>>,

    /// Status label of the most recent attempt (HTTP code or "error").
    pub last_delivery_status: Option<String>,

    /// Record creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Data required to create a new webhook.
#[derive(Debug, Clone)]
pub struct NewWebhook {
    pub tenant_id: Uuid,
    pub name: String,
    pub url: String,
    pub secret: String,
    pub events: Vec<String>,
    pub filters: Option<serde_json::Value>,
    pub retry_count: i32,
    pub timeout_seconds: i32,
}

/// Partial update of a webhook. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct WebhookUpdate {
    pub name: Option<String>,
    pub url: Option<String>,
    pub events: Option<Vec<String>>,
    /// `Some(None)` clears the filter spec; `Some(Some(v))` replaces it.
    pub filters: Option<Option<serde_json::Value>>,
    pub is_active: Option<bool>,
    pub retry_count: Option<i32>,
    pub timeout_seconds: Option<i32>,
}

impl WebhookUpdate {
    /// True when no field is set, i.e. the update is a no-op.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.url.is_none()
            && self.events.is_none()
            && self.filters.is_none()
            && self.is_active.is_none()
            && self.retry_count.is_none()
            && self.timeout_seconds.is_none()
    }
}
