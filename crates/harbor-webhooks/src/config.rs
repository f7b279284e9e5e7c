//! Webhook subsystem configuration.
//!
//! All components receive their settings through [`WebhooksConfig`] at
//! construction time; there is no implicit global state. Configuration
//! errors are fatal and surface before any dispatch call is accepted.

use std::env;
use std::sync::Arc;

use crate::backoff::{BackoffPolicy, FixedScheduleBackoff, DEFAULT_BACKOFF_SCHEDULE_SECS};
use crate::error::WebhookError;

/// Default descriptive user agent sent with deliveries.
pub const DEFAULT_USER_AGENT: &str = "harbor-webhooks/1.0";

/// Tunables for dispatch, delivery, and retry draining.
#[derive(Debug, Clone)]
pub struct WebhooksConfig {
    /// `User-Agent` header value for outbound deliveries.
    pub user_agent: String,
    /// Maximum concurrent deliveries per dispatched event.
    pub dispatch_concurrency: usize,
    /// Jobs drained per retry-scheduler pass.
    pub drain_batch_size: i64,
    /// Stored response bodies are truncated to this many characters.
    pub response_body_limit: usize,
    /// Retry budget applied when registration does not specify one.
    pub default_retry_count: i32,
    /// Per-attempt timeout applied when registration does not specify one.
    pub default_timeout_seconds: i32,
    /// Permit webhook URLs pointing at private/internal hosts (development
    /// and tests only).
    pub allow_private_hosts: bool,
    /// Retry backoff escalation schedule, in seconds.
    pub backoff_schedule_secs: Vec<u64>,
}

impl Default for WebhooksConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            dispatch_concurrency: 8,
            drain_batch_size: 10,
            response_body_limit: 5000,
            default_retry_count: 3,
            default_timeout_seconds: 30,
            allow_private_hosts: false,
            backoff_schedule_secs: DEFAULT_BACKOFF_SCHEDULE_SECS.to_vec(),
        }
    }
}

impl WebhooksConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `HARBOR_WEBHOOKS_USER_AGENT`
    /// - `HARBOR_WEBHOOKS_CONCURRENCY` (positive integer, default 8)
    /// - `HARBOR_WEBHOOKS_DRAIN_BATCH` (positive integer, default 10)
    /// - `HARBOR_WEBHOOKS_ALLOW_PRIVATE_HOSTS` ("true"/"1")
    /// - `HARBOR_WEBHOOKS_BACKOFF_SCHEDULE` (comma-separated seconds)
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::ConfigInvalid`] for unparseable or
    /// out-of-range values; callers should treat this as fatal at startup.
    pub fn from_env() -> Result<Self, WebhookError> {
        let mut config = Self::default();

        if let Ok(v) = env::var("HARBOR_WEBHOOKS_USER_AGENT") {
            config.user_agent = v;
        }

        if let Ok(v) = env::var("HARBOR_WEBHOOKS_CONCURRENCY") {
            config.dispatch_concurrency =
                v.parse().map_err(|_| WebhookError::ConfigInvalid {
                    var: "HARBOR_WEBHOOKS_CONCURRENCY".to_string(),
                    reason: format!("not a positive integer: {v}"),
                })?;
        }

        if let Ok(v) = env::var("HARBOR_WEBHOOKS_DRAIN_BATCH") {
            config.drain_batch_size = v.parse().map_err(|_| WebhookError::ConfigInvalid {
                var: "HARBOR_WEBHOOKS_DRAIN_BATCH".to_string(),
                reason: format!("not a positive integer: {v}"),
            })?;
        }

        if let Ok(v) = env::var("HARBOR_WEBHOOKS_ALLOW_PRIVATE_HOSTS") {
            config.allow_private_hosts = matches!(v.as_str(), "true" | "1");
        }

        if let Ok(v) = env::var("HARBOR_WEBHOOKS_BACKOFF_SCHEDULE") {
            let schedule: Result<Vec<u64>, _> =
                v.split(',').map(|s| s.trim().parse::<u64>()).collect();
            config.backoff_schedule_secs =
                schedule.map_err(|_| WebhookError::ConfigInvalid {
                    var: "HARBOR_WEBHOOKS_BACKOFF_SCHEDULE".to_string(),
                    reason: format!("must be comma-separated seconds: {v}"),
                })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the dispatch worker pool size.
    #[must_use]
    pub fn with_dispatch_concurrency(mut self, concurrency: usize) -> Self {
        self.dispatch_concurrency = concurrency;
        self
    }

    /// Set the per-drain job batch size.
    #[must_use]
    pub fn with_drain_batch_size(mut self, batch: i64) -> Self {
        self.drain_batch_size = batch;
        self
    }

    /// Permit private/internal webhook hosts (development and tests).
    #[must_use]
    pub fn with_allow_private_hosts(mut self, allow: bool) -> Self {
        self.allow_private_hosts = allow;
        self
    }

    /// Replace the backoff escalation schedule.
    #[must_use]
    pub fn with_backoff_schedule(mut self, secs: Vec<u64>) -> Self {
        self.backoff_schedule_secs = secs;
        self
    }

    /// Check invariants; fatal at startup when violated.
    pub fn validate(&self) -> Result<(), WebhookError> {
        if self.dispatch_concurrency == 0 {
            return Err(WebhookError::ConfigInvalid {
                var: "dispatch_concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.drain_batch_size <= 0 {
            return Err(WebhookError::ConfigInvalid {
                var: "drain_batch_size".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.backoff_schedule_secs.is_empty() {
            return Err(WebhookError::ConfigInvalid {
                var: "backoff_schedule_secs".to_string(),
                reason: "schedule must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Build the backoff policy from the configured schedule.
    #[must_use]
    pub fn backoff_policy(&self) -> Arc<dyn BackoffPolicy> {
        Arc::new(FixedScheduleBackoff::from_secs(&self.backoff_schedule_secs))
    }
}
