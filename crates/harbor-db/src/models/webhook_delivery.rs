//! Delivery record model.
//!
//! One record tracks the full attempt chain for a single (webhook, event
//! occurrence) pair; retries mutate the record in place rather than
//! duplicating it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle status of a delivery chain.
///
/// `Success` and `Failed` are terminal; a chain reaches a terminal status
/// exactly once. A failed attempt with retry budget remaining moves the
/// record to `Retrying` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Pending,
    Success,
    Failed,
    Retrying,
}

impl DeliveryStatus {
    /// Stored string form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Retrying => "retrying",
        }
    }

    /// Parse the stored string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "retrying" => Some(Self::Retrying),
            _ => None,
        }
    }

    /// Whether this status ends the chain.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// A webhook delivery record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookDelivery {
    /// Unique delivery chain identifier.
    pub id: Uuid,

    /// Webhook this chain belongs to.
    pub webhook_id: Uuid,

    /// Event name that triggered the chain.
    pub event_type: String,

    /// Payload snapshot `{event, timestamp, data}` for the latest attempt.
    pub payload: serde_json::Value,

    /// Chain status: pending, success, failed, retrying.
    pub status: String,

    /// Current attempt number (1-based, monotonically non-decreasing).
    pub attempt_number: i32,

    /// HTTP status code of the latest attempt, if a response was received.
    pub status_code: Option<i16>,

    /// Truncated response body of the latest attempt.
    pub response_body: Option<String>,

    /// Latency of the latest attempt in milliseconds.
    pub response_time_ms: Option<i32>,

    /// When the next attempt is scheduled, while retrying.
    pub next_retry_at: Option<DateTime<Utc>>,

    /// Error description of the latest failed attempt.
    pub error_message: Option<String>,

    /// Record creation timestamp (first attempt).
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl WebhookDelivery {
    /// Typed view of the status column.
    #[must_use]
    pub fn delivery_status(&self) -> Option<DeliveryStatus> {
        DeliveryStatus::parse(&self.status)
    }
}

/// Data required to create a delivery record for a first attempt.
#[derive(Debug, Clone)]
pub struct NewWebhookDelivery {
    pub webhook_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub attempt_number: i32,
}

/// Outcome of one HTTP attempt, applied to the delivery record.
#[derive(Debug, Clone)]
pub struct DeliveryAttemptOutcome {
    /// Resulting chain status (`Success`, `Failed`, or `Retrying`).
    pub status: DeliveryStatus,
    pub status_code: Option<i16>,
    pub response_body: Option<String>,
    pub response_time_ms: Option<i32>,
    pub error_message: Option<String>,
    /// Set when `status` is `Retrying`.
    pub next_retry_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            DeliveryStatus::Pending,
            DeliveryStatus::Success,
            DeliveryStatus::Failed,
            DeliveryStatus::Retrying,
        ] {
            assert_eq!(DeliveryStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_status_parse_unknown() {
        assert_eq!(DeliveryStatus::parse("abandoned"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(DeliveryStatus::Success.is_terminal());
        assert!(DeliveryStatus::Failed.is_terminal());
        assert!(!DeliveryStatus::Pending.is_terminal());
        assert!(!DeliveryStatus::Retrying.is_terminal());
    }
}
