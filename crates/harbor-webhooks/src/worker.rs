//! Background worker that consumes published events and dispatches them.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;
use tokio::sync::Notify;

use crate::services::dispatch_service::EventDispatcher;
use crate::services::event_publisher::DispatchEvent;

/// Consumes the event broadcast channel and drives the dispatcher.
pub struct DispatchWorker {
    dispatcher: Arc<EventDispatcher>,
    shutdown: Arc<Notify>,
}

impl DispatchWorker {
    /// Create a worker over the shared dispatcher.
    #[must_use]
    pub fn new(dispatcher: Arc<EventDispatcher>) -> Self {
        Self {
            dispatcher,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Run until the channel closes or shutdown is requested.
    ///
    /// A lagged receiver (the publisher outpaced this worker past the
    /// channel capacity) drops the missed events and keeps going; dropped
    /// events are logged with the lag count.
    pub async fn run(&self, mut receiver: Receiver<DispatchEvent>) {
        tracing::info!(target: "webhook_delivery", "Starting dispatch worker");

        loop {
            tokio::select! {
                received = receiver.recv() => match received {
                    Ok(event) => {
                        self.dispatcher
                            .trigger(&event.event, &event.data, event.tenant_id)
                            .await;
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(
                            target: "webhook_delivery",
                            missed,
                            "Dispatch worker lagged; events dropped"
                        );
                    }
                    Err(RecvError::Closed) => {
                        tracing::info!(
                            target: "webhook_delivery",
                            "Event channel closed, stopping dispatch worker"
                        );
                        break;
                    }
                },
                () = self.shutdown.notified() => {
                    tracing::info!(
                        target: "webhook_delivery",
                        "Dispatch worker shutdown requested"
                    );
                    break;
                }
            }
        }
    }

    /// Request graceful shutdown.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}
