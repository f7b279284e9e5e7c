//! Entity types tracked by the webhook delivery pipeline.

mod retry_job;
mod webhook;
mod webhook_delivery;

pub use retry_job::{NewRetryJob, RetryJob, RetryJobStatus, RETRY_JOB_TYPE};
pub use webhook::{NewWebhook, Webhook, WebhookUpdate};
pub use webhook_delivery::{
    DeliveryAttemptOutcome, DeliveryStatus, NewWebhookDelivery, WebhookDelivery,
};
