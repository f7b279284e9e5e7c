//! Common test utilities for harbor-webhooks integration tests.
//!
//! Provides wiremock responders, a fully wired in-memory service stack, and
//! fixtures for exercising dispatch, delivery, and retry behavior without a
//! real database.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use harbor_db::{MemoryWebhookStore, WebhookStore};
use harbor_webhooks::models::{RegisterWebhook, RegisteredWebhook};
use harbor_webhooks::{
    DeliveryService, EventDispatcher, RetryScheduler, WebhookRegistry, WebhooksConfig,
};

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

/// Standard test tenant IDs
pub const TENANT_A: Uuid = Uuid::from_bytes([
    0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11,
]);

pub const TENANT_B: Uuid = Uuid::from_bytes([
    0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22,
]);

// ---------------------------------------------------------------------------
// In-memory service stack
// ---------------------------------------------------------------------------

/// Every webhook component wired over one shared in-memory store.
pub struct TestStack {
    pub store: Arc<MemoryWebhookStore>,
    pub registry: WebhookRegistry,
    pub dispatcher: EventDispatcher,
    pub delivery: Arc<DeliveryService>,
    pub scheduler: RetryScheduler,
}

/// Test configuration: private hosts allowed (mock servers bind loopback)
/// and zero-delay backoff so retry jobs are immediately due.
pub fn test_config() -> WebhooksConfig {
    WebhooksConfig::default()
        .with_allow_private_hosts(true)
        .with_backoff_schedule(vec![0])
}

/// Build a stack with the given configuration.
pub fn stack_with_config(config: &WebhooksConfig) -> TestStack {
    let store = Arc::new(MemoryWebhookStore::new());
    let store_dyn: Arc<dyn WebhookStore> = store.clone();

    let delivery = Arc::new(
        DeliveryService::new(Arc::clone(&store_dyn), config).expect("failed to build delivery"),
    );
    let registry = WebhookRegistry::new(Arc::clone(&store_dyn), config);
    let dispatcher = EventDispatcher::new(Arc::clone(&store_dyn), Arc::clone(&delivery), config);
    let scheduler = RetryScheduler::new(store_dyn, Arc::clone(&delivery), config);

    TestStack {
        store,
        registry,
        dispatcher,
        delivery,
        scheduler,
    }
}

/// Build a stack with the standard test configuration.
pub fn test_stack() -> TestStack {
    stack_with_config(&test_config())
}

/// Register a webhook for `TENANT_A` pointed at `url`.
pub async fn register_webhook(
    stack: &TestStack,
    url: &str,
    events: &[&str],
    retry_count: i32,
) -> RegisteredWebhook {
    stack
        .registry
        .register(RegisterWebhook {
            tenant_id: TENANT_A,
            name: "test hook".to_string(),
            url: url.to_string(),
            events: events.iter().map(ToString::to_string).collect(),
            filters: None,
            retry_count: Some(retry_count),
            timeout_seconds: Some(5),
        })
        .await
        .expect("failed to register webhook")
}

/// Mount a responder on a fresh mock server, matching all POSTs.
pub async fn mock_endpoint(responder: impl Respond + 'static) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(responder)
        .mount(&server)
        .await;
    server
}

// ---------------------------------------------------------------------------
// CapturedRequest - for inspecting webhook requests
// ---------------------------------------------------------------------------

/// A captured HTTP request with body and headers.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl CapturedRequest {
    /// Parse the body as JSON.
    pub fn body_json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("captured body is not JSON")
    }

    /// Get a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        let name_lower = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| k.to_lowercase() == name_lower)
            .map(|(_, v)| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// CaptureResponder - captures requests and returns a fixed status
// ---------------------------------------------------------------------------

/// A wiremock responder that captures incoming requests.
#[derive(Clone)]
pub struct CaptureResponder {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    response_code: u16,
    response_body: Option<String>,
}

impl CaptureResponder {
    /// Create a new capture responder that returns 200 OK.
    pub fn new() -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            response_code: 200,
            response_body: None,
        }
    }

    /// Create a capture responder that returns a custom status code.
    pub fn with_status(status: u16) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            response_code: status,
            response_body: None,
        }
    }

    /// Set a fixed response body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.response_body = Some(body.into());
        self
    }

    /// Get all captured requests.
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Get the number of captured requests.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Default for CaptureResponder {
    fn default() -> Self {
        Self::new()
    }
}

impl Respond for CaptureResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let captured = CapturedRequest {
            body: request.body.clone(),
            headers: request
                .headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                .collect(),
            timestamp: Utc::now(),
        };
        self.requests.lock().unwrap().push(captured);

        let template = ResponseTemplate::new(self.response_code);
        match &self.response_body {
            Some(body) => template.set_body_string(body.clone()),
            None => template,
        }
    }
}

// ---------------------------------------------------------------------------
// CountingResponder - counts requests
// ---------------------------------------------------------------------------

/// A wiremock responder that counts incoming requests.
#[derive(Clone)]
pub struct CountingResponder {
    count: Arc<AtomicU32>,
    response_code: u16,
}

impl CountingResponder {
    /// Create a new counting responder that returns 200 OK.
    pub fn new() -> Self {
        Self {
            count: Arc::new(AtomicU32::new(0)),
            response_code: 200,
        }
    }

    /// Create a counting responder that returns a custom status code.
    pub fn with_status(status: u16) -> Self {
        Self {
            count: Arc::new(AtomicU32::new(0)),
            response_code: status,
        }
    }

    /// Get the current request count.
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }
}

impl Default for CountingResponder {
    fn default() -> Self {
        Self::new()
    }
}

impl Respond for CountingResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.count.fetch_add(1, Ordering::SeqCst);
        ResponseTemplate::new(self.response_code)
    }
}

// ---------------------------------------------------------------------------
// FailingResponder - fails N times then succeeds
// ---------------------------------------------------------------------------

/// A wiremock responder that fails a specified number of times before
/// succeeding.
#[derive(Clone)]
pub struct FailingResponder {
    attempt_count: Arc<AtomicU32>,
    failures_before_success: u32,
    failure_code: u16,
}

impl FailingResponder {
    /// Create a responder that fails `n` times with 500, then returns 200.
    pub fn fail_times(n: u32) -> Self {
        Self {
            attempt_count: Arc::new(AtomicU32::new(0)),
            failures_before_success: n,
            failure_code: 500,
        }
    }

    /// Get the current attempt count.
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count.load(Ordering::SeqCst)
    }
}

impl Respond for FailingResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.attempt_count.fetch_add(1, Ordering::SeqCst);
        if n < self.failures_before_success {
            ResponseTemplate::new(self.failure_code)
        } else {
            ResponseTemplate::new(200)
        }
    }
}

// ---------------------------------------------------------------------------
// DelayedResponder - adds response delay
// ---------------------------------------------------------------------------

/// A wiremock responder that adds a delay before responding.
#[derive(Clone)]
pub struct DelayedResponder {
    delay: Duration,
    response_code: u16,
}

impl DelayedResponder {
    /// Create a responder that delays for `ms` milliseconds, then 200.
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            response_code: 200,
        }
    }
}

impl Respond for DelayedResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        ResponseTemplate::new(self.response_code).set_delay(self.delay)
    }
}

// ---------------------------------------------------------------------------
// Polling helper
// ---------------------------------------------------------------------------

/// Poll `check` every 10ms until it returns `Some`, or panic after
/// `timeout_ms`.
pub async fn wait_for<T, F, Fut>(timeout_ms: u64, mut check: F) -> T
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Option<T>>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        if let Some(value) = check().await {
            return value;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met within {timeout_ms}ms");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
