//! Webhook registry: subscription CRUD and secret lifecycle.

use std::sync::Arc;

use uuid::Uuid;

use harbor_db::models::{NewWebhook, WebhookDelivery, WebhookUpdate};
use harbor_db::WebhookStore;

use crate::config::WebhooksConfig;
use crate::crypto;
use crate::error::WebhookError;
use crate::filter::FilterSpec;
use crate::models::{RegisterWebhook, RegisteredWebhook, WebhookDetails};
use crate::validation;

/// Default number of delivery records returned by history queries.
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// Service for webhook subscription operations.
///
/// Owns secret generation and the read-side redaction invariant: the
/// signing secret is returned exactly once, by [`register`] and
/// [`rotate_secret`]; no read operation includes it.
///
/// [`register`]: WebhookRegistry::register
/// [`rotate_secret`]: WebhookRegistry::rotate_secret
#[derive(Clone)]
pub struct WebhookRegistry {
    store: Arc<dyn WebhookStore>,
    allow_private_hosts: bool,
    default_retry_count: i32,
    default_timeout_seconds: i32,
}

impl WebhookRegistry {
    /// Create a registry over the shared store.
    #[must_use]
    pub fn new(store: Arc<dyn WebhookStore>, config: &WebhooksConfig) -> Self {
        Self {
            store,
            allow_private_hosts: config.allow_private_hosts,
            default_retry_count: config.default_retry_count,
            default_timeout_seconds: config.default_timeout_seconds,
        }
    }

    /// Register a new webhook subscription.
    ///
    /// Validates the URL (http/https, SSRF guard), the event list, and the
    /// filter spec; nothing is persisted on validation failure. The signing
    /// secret is generated server-side and returned only here.
    pub async fn register(
        &self,
        request: RegisterWebhook,
    ) -> Result<RegisteredWebhook, WebhookError> {
        validation::validate_webhook_url(&request.url, self.allow_private_hosts)?;
        validation::validate_events(&request.events)?;
        if let Some(filters) = &request.filters {
            FilterSpec::parse(filters)?;
        }

        let secret = crypto::generate_secret();

        let webhook = self
            .store
            .insert_webhook(NewWebhook {
                tenant_id: request.tenant_id,
                name: request.name.trim().to_string(),
                url: request.url.trim().to_string(),
                secret: secret.clone(),
                events: request.events,
                filters: request.filters,
                retry_count: request.retry_count.unwrap_or(self.default_retry_count),
                timeout_seconds: request
                    .timeout_seconds
                    .unwrap_or(self.default_timeout_seconds),
            })
            .await?;

        tracing::info!(
            webhook_id = %webhook.id,
            tenant_id = %webhook.tenant_id,
            "Registered webhook"
        );

        Ok(RegisteredWebhook {
            webhook: webhook.into(),
            secret,
        })
    }

    /// Apply a partial update, re-validating any supplied URL, event list,
    /// or filter spec. An empty update returns the current state unchanged.
    pub async fn update(
        &self,
        tenant_id: Uuid,
        webhook_id: Uuid,
        update: WebhookUpdate,
    ) -> Result<WebhookDetails, WebhookError> {
        if let Some(url) = &update.url {
            validation::validate_webhook_url(url, self.allow_private_hosts)?;
        }
        if let Some(events) = &update.events {
            validation::validate_events(events)?;
        }
        if let Some(Some(filters)) = &update.filters {
            FilterSpec::parse(filters)?;
        }

        if update.is_empty() {
            return self.get(tenant_id, webhook_id).await;
        }

        let webhook = self
            .store
            .update_webhook(tenant_id, webhook_id, update)
            .await?
            .ok_or(WebhookError::WebhookNotFound)?;

        Ok(webhook.into())
    }

    /// Delete a webhook.
    pub async fn delete(&self, tenant_id: Uuid, webhook_id: Uuid) -> Result<(), WebhookError> {
        let deleted = self.store.delete_webhook(tenant_id, webhook_id).await?;
        if !deleted {
            return Err(WebhookError::WebhookNotFound);
        }

        tracing::info!(webhook_id = %webhook_id, tenant_id = %tenant_id, "Deleted webhook");
        Ok(())
    }

    /// Atomically replace the signing secret, returning the new value.
    ///
    /// Signatures computed with the old secret become unverifiable
    /// immediately, including retries already in flight for this webhook,
    /// which will then fail verification at the receiver.
    pub async fn rotate_secret(
        &self,
        tenant_id: Uuid,
        webhook_id: Uuid,
    ) -> Result<String, WebhookError> {
        let secret = crypto::generate_secret();

        let updated = self
            .store
            .update_webhook_secret(tenant_id, webhook_id, &secret)
            .await?;
        if !updated {
            return Err(WebhookError::WebhookNotFound);
        }

        tracing::info!(webhook_id = %webhook_id, tenant_id = %tenant_id, "Rotated webhook secret");
        Ok(secret)
    }

    /// List a tenant's webhooks, newest first.
    pub async fn list(&self, tenant_id: Uuid) -> Result<Vec<WebhookDetails>, WebhookError> {
        let webhooks = self.store.list_webhooks(tenant_id).await?;
        Ok(webhooks.into_iter().map(Into::into).collect())
    }

    /// Fetch a single webhook.
    pub async fn get(
        &self,
        tenant_id: Uuid,
        webhook_id: Uuid,
    ) -> Result<WebhookDetails, WebhookError> {
        let webhook = self
            .store
            .find_webhook(tenant_id, webhook_id)
            .await?
            .ok_or(WebhookError::WebhookNotFound)?;
        Ok(webhook.into())
    }

    /// Read-only delivery audit trail for a webhook, newest first.
    pub async fn delivery_history(
        &self,
        tenant_id: Uuid,
        webhook_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<WebhookDelivery>, WebhookError> {
        // Scope check before reading the history.
        self.store
            .find_webhook(tenant_id, webhook_id)
            .await?
            .ok_or(WebhookError::WebhookNotFound)?;

        let deliveries = self
            .store
            .list_deliveries(webhook_id, limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
            .await?;
        Ok(deliveries)
    }
}
