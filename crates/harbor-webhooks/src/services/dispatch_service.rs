//! Event fan-out to subscribed webhooks.
//!
//! `trigger` is best-effort from the caller's perspective: it never fails
//! because of an individual webhook, and one tenant's broken endpoint never
//! delays or blocks delivery to others.

use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;
use uuid::Uuid;

use harbor_db::models::Webhook;
use harbor_db::WebhookStore;

use crate::config::WebhooksConfig;
use crate::filter::FilterSpec;
use crate::services::delivery_service::DeliveryService;

/// Fans an event out to all matching active webhooks.
#[derive(Clone)]
pub struct EventDispatcher {
    store: Arc<dyn WebhookStore>,
    delivery: Arc<DeliveryService>,
    concurrency: usize,
}

impl EventDispatcher {
    /// Create a dispatcher over the shared store and delivery worker.
    #[must_use]
    pub fn new(
        store: Arc<dyn WebhookStore>,
        delivery: Arc<DeliveryService>,
        config: &WebhooksConfig,
    ) -> Self {
        Self {
            store,
            delivery,
            concurrency: config.dispatch_concurrency.max(1),
        }
    }

    /// Dispatch an event to every active, subscribed, filter-matching
    /// webhook, optionally scoped to one tenant.
    ///
    /// Deliveries run through a bounded worker pool; per-webhook failures
    /// are recorded on their delivery records and logged, never returned.
    pub async fn trigger(&self, event: &str, data: &Value, tenant_id: Option<Uuid>) {
        let webhooks = match self.store.find_active_by_event(event, tenant_id).await {
            Ok(webhooks) => webhooks,
            Err(e) => {
                tracing::error!(
                    target: "webhook_delivery",
                    event_type = %event,
                    error = %e,
                    "Failed to query subscribed webhooks"
                );
                return;
            }
        };

        let matching: Vec<Webhook> = webhooks
            .into_iter()
            .filter(|webhook| filter_matches(webhook, data))
            .collect();

        if matching.is_empty() {
            tracing::debug!(
                target: "webhook_delivery",
                event_type = %event,
                "No matching webhooks for event"
            );
            return;
        }

        tracing::info!(
            target: "webhook_delivery",
            event_type = %event,
            webhook_count = matching.len(),
            "Dispatching event to matching webhooks"
        );

        futures::stream::iter(matching)
            .for_each_concurrent(self.concurrency, |webhook| {
                let delivery = Arc::clone(&self.delivery);
                async move {
                    let result = delivery.deliver(&webhook, event, data, 1, None).await;
                    if !result.success {
                        tracing::warn!(
                            target: "webhook_delivery",
                            webhook_id = %webhook.id,
                            event_type = %event,
                            error = result.error.as_deref().unwrap_or("unknown"),
                            "Dispatch delivery failed"
                        );
                    }
                }
            })
            .await;
    }
}

/// Evaluate a webhook's stored filter spec against event data.
///
/// No spec always matches. A stored spec that no longer parses (possible
/// only through out-of-band edits, since registration validates) is logged
/// and treated as matching, preserving the fail-open posture of absent
/// filters.
fn filter_matches(webhook: &Webhook, data: &Value) -> bool {
    match &webhook.filters {
        None => true,
        Some(raw) => match FilterSpec::parse(raw) {
            Ok(spec) => spec.matches(data),
            Err(e) => {
                tracing::warn!(
                    target: "webhook_delivery",
                    webhook_id = %webhook.id,
                    error = %e,
                    "Stored filter spec is invalid; delivering anyway"
                );
                true
            }
        },
    }
}
