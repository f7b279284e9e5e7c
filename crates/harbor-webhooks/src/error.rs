//! Error types for the webhook system.

use thiserror::Error;

/// Webhook system error variants.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Storage error: {0}")]
    Store(#[from] harbor_db::DbError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("SSRF protection: {0}")]
    SsrfBlocked(String),

    #[error("Webhook not found")]
    WebhookNotFound,

    #[error("Delivery not found")]
    DeliveryNotFound,

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Missing required configuration: {var}")]
    ConfigMissing { var: String },

    #[error("Invalid configuration for {var}: {reason}")]
    ConfigInvalid { var: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, WebhookError>;
