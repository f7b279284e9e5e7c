//! Retry job model.
//!
//! A deferred unit of work: "redeliver this delivery record at attempt N no
//! earlier than time T". Jobs are claimed with an atomic conditional update
//! so concurrent scheduler instances never execute the same job twice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Job type marker for webhook redelivery jobs.
pub const RETRY_JOB_TYPE: &str = "retry_webhook";

/// Lifecycle status of a retry job. Each job instance is terminal after one
/// execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryJobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl RetryJobStatus {
    /// Stored string form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse the stored string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A persisted retry job.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RetryJob {
    /// Unique job identifier.
    pub id: Uuid,

    /// Job type (`retry_webhook`).
    pub job_type: String,

    /// Work payload: webhook id, event, data, attempt number, delivery id.
    pub payload: serde_json::Value,

    /// Earliest time the job may run.
    pub scheduled_for: DateTime<Utc>,

    /// Job status: pending, processing, completed, failed.
    pub status: String,

    /// How many times the job has been claimed.
    pub attempts: i32,

    /// Attempt budget of the owning delivery chain.
    pub max_attempts: i32,

    /// Result snapshot recorded at completion, plus scheduling provenance.
    pub result: Option<serde_json::Value>,

    /// Error description when the job failed.
    pub error_message: Option<String>,

    /// When the job was claimed.
    pub started_at: Option<DateTime<Utc>>,

    /// When the job finished.
    pub completed_at: Option<DateTime<Utc>>,

    /// Record creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl RetryJob {
    /// Typed view of the status column.
    #[must_use]
    pub fn job_status(&self) -> Option<RetryJobStatus> {
        RetryJobStatus::parse(&self.status)
    }
}

/// Data required to enqueue a retry job.
#[derive(Debug, Clone)]
pub struct NewRetryJob {
    pub payload: serde_json::Value,
    pub scheduled_for: DateTime<Utc>,
    pub max_attempts: i32,
    pub result: Option<serde_json::Value>,
}
