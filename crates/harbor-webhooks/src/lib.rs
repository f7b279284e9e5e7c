//! Webhook dispatch and retry subsystem for platform domain events.
//!
//! Delivers signed HTTP callbacks to tenant-registered endpoints with
//! concurrent fan-out, HMAC-SHA256 payload signatures, durable retries with
//! escalating backoff, and horizontal-scaling-safe retry job claiming.

pub mod backoff;
pub mod config;
pub mod crypto;
pub mod error;
pub mod filter;
pub mod models;
pub mod services;
pub mod validation;
pub mod worker;

pub use backoff::{BackoffPolicy, FixedScheduleBackoff};
pub use config::WebhooksConfig;
pub use error::WebhookError;
pub use filter::{FilterExpr, FilterSpec};
pub use models::{
    DeliveryResult, RegisterWebhook, RegisteredWebhook, RetrySummary, WebhookDetails,
    WebhookPayload,
};
pub use services::delivery_service::DeliveryService;
pub use services::dispatch_service::EventDispatcher;
pub use services::event_publisher::{DispatchEvent, EventPublisher};
pub use services::registry_service::WebhookRegistry;
pub use services::retry_service::RetryScheduler;
pub use worker::DispatchWorker;
