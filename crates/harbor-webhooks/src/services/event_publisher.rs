//! Fire-and-forget event publishing seam for host subsystems.
//!
//! Producers publish domain events to a broadcast channel and move on; the
//! dispatch worker consumes the channel and drives the dispatcher. Errors
//! never propagate to the publisher.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A domain event queued for webhook dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchEvent {
    /// Event name, e.g. `lead.created`.
    pub event: String,
    /// Event data payload.
    pub data: Value,
    /// Restrict dispatch to one tenant's webhooks when set.
    pub tenant_id: Option<Uuid>,
}

/// Publisher that sends dispatch events to a broadcast channel.
#[derive(Clone)]
pub struct EventPublisher {
    sender: tokio::sync::broadcast::Sender<DispatchEvent>,
}

impl EventPublisher {
    /// Create a new event publisher with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, tokio::sync::broadcast::Receiver<DispatchEvent>) {
        let (sender, receiver) = tokio::sync::broadcast::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Publish an event to all subscribers. Fire-and-forget: a missing
    /// subscriber is logged, not returned.
    pub fn publish(&self, event: DispatchEvent) {
        if let Err(e) = self.sender.send(event) {
            tracing::warn!(
                target: "webhook_delivery",
                error = %e,
                "No active dispatch workers to receive event"
            );
        }
    }

    /// Get a new receiver for the broadcast channel.
    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<DispatchEvent> {
        self.sender.subscribe()
    }
}
