//! Persistence layer for the Harbor webhook delivery subsystem.
//!
//! Provides the entity types tracked by the delivery pipeline (webhooks,
//! delivery records, retry jobs), the [`WebhookStore`] trait that the domain
//! services are written against, and two backends: a Postgres implementation
//! backed by `sqlx`, and an in-memory implementation for tests and embedded
//! single-process deployments.

pub mod config;
pub mod error;
pub mod migrations;
pub mod models;
pub mod store;

pub use config::DbConfig;
pub use error::DbError;
pub use migrations::run_migrations;
pub use store::memory::MemoryWebhookStore;
pub use store::postgres::PgWebhookStore;
pub use store::WebhookStore;
