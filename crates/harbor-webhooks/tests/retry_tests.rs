//! Integration tests for retry scheduling, draining, and chain termination.

mod common;

use common::*;
use harbor_db::WebhookStore;
use serde_json::json;

/// Test: with a retry budget of 3 and an endpoint that always fails,
/// exactly 3 attempts run, the chain ends `failed`, and no further job is
/// scheduled.
#[tokio::test]
async fn test_budget_of_three_runs_exactly_three_attempts() {
    let stack = test_stack();
    let capture = CaptureResponder::with_status(500);
    let server = mock_endpoint(capture.clone()).await;

    let registered = register_webhook(&stack, &server.uri(), &["lead.created"], 3).await;

    // Attempt 1 (dispatch) fails and schedules attempt 2.
    stack
        .dispatcher
        .trigger("lead.created", &json!({"amount": 150}), None)
        .await;
    assert_eq!(capture.request_count(), 1);

    // Attempt 2: failed with budget remaining. The job completed, and the
    // next job is already enqueued.
    let summary = stack.scheduler.process_retry_jobs(10).await;
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(capture.request_count(), 2);

    // Attempt 3: budget exhausted. Job failed, chain terminal.
    let summary = stack.scheduler.process_retry_jobs(10).await;
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.completed, 0);
    assert_eq!(summary.failed, 1);
    assert_eq!(capture.request_count(), 3);

    let history = stack
        .registry
        .delivery_history(TENANT_A, registered.webhook.id, None)
        .await
        .unwrap();
    assert_eq!(history.len(), 1, "retries mutate one chain, not new rows");
    assert_eq!(history[0].status, "failed");
    assert_eq!(history[0].attempt_number, 3);

    // No job remains after the final attempt.
    let summary = stack.scheduler.process_retry_jobs(10).await;
    assert_eq!(summary.processed, 0);
    assert_eq!(capture.request_count(), 3);
}

/// Concrete scenario: retry budget 2, both attempts fail. The delivery
/// record `failed`, retry job `failed`, no third attempt scheduled.
#[tokio::test]
async fn test_budget_of_two_scenario() {
    let stack = test_stack();
    let capture = CaptureResponder::with_status(500);
    let server = mock_endpoint(capture.clone()).await;

    let registered = register_webhook(&stack, &server.uri(), &["lead.created"], 2).await;

    stack
        .dispatcher
        .trigger("lead.created", &json!({"amount": 150}), None)
        .await;

    // Grab the scheduled job id before draining so its final state can be
    // inspected.
    let due = stack
        .store
        .due_retry_jobs(chrono::Utc::now(), 10)
        .await
        .unwrap();
    assert_eq!(due.len(), 1);
    let job_id = due[0].id;
    assert_eq!(due[0].max_attempts, 2);

    let summary = stack.scheduler.process_retry_jobs(10).await;
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(capture.request_count(), 2);

    let job = stack.store.find_retry_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, "failed");
    assert_eq!(job.attempts, 1);
    assert!(job.completed_at.is_some());
    // Result snapshot records the failed delivery.
    let result = job.result.expect("job result snapshot missing");
    assert_eq!(result["success"], false);

    let history = stack
        .registry
        .delivery_history(TENANT_A, registered.webhook.id, None)
        .await
        .unwrap();
    assert_eq!(history[0].status, "failed");
    assert_eq!(history[0].attempt_number, 2);

    // No third attempt.
    let summary = stack.scheduler.process_retry_jobs(10).await;
    assert_eq!(summary.processed, 0);
    assert_eq!(capture.request_count(), 2);
}

/// Test: an endpoint that recovers turns the chain `success` and stops the
/// retry loop.
#[tokio::test]
async fn test_eventual_success_ends_chain() {
    let stack = test_stack();
    let failing = FailingResponder::fail_times(1);
    let server = mock_endpoint(failing.clone()).await;

    let registered = register_webhook(&stack, &server.uri(), &["lead.created"], 3).await;

    stack
        .dispatcher
        .trigger("lead.created", &json!({"amount": 150}), None)
        .await;
    assert_eq!(failing.attempt_count(), 1);

    let summary = stack.scheduler.process_retry_jobs(10).await;
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.completed, 1);
    assert_eq!(failing.attempt_count(), 2);

    let history = stack
        .registry
        .delivery_history(TENANT_A, registered.webhook.id, None)
        .await
        .unwrap();
    assert_eq!(history[0].status, "success");
    assert_eq!(history[0].attempt_number, 2);

    // Counters saw one failure and one success.
    let webhook = stack
        .registry
        .get(TENANT_A, registered.webhook.id)
        .await
        .unwrap();
    assert_eq!(webhook.total_deliveries, 2);
    assert_eq!(webhook.successful_deliveries, 1);
    assert_eq!(webhook.failed_deliveries, 1);

    // Nothing left to drain.
    let summary = stack.scheduler.process_retry_jobs(10).await;
    assert_eq!(summary.processed, 0);
}

/// Test: retry jobs against a deactivated webhook fail without delivering.
#[tokio::test]
async fn test_retry_against_disabled_webhook_fails_job() {
    let stack = test_stack();
    let capture = CaptureResponder::with_status(500);
    let server = mock_endpoint(capture.clone()).await;

    let registered = register_webhook(&stack, &server.uri(), &["lead.created"], 3).await;

    stack
        .dispatcher
        .trigger("lead.created", &json!({"amount": 150}), None)
        .await;
    assert_eq!(capture.request_count(), 1);

    // Deactivate before the retry runs.
    stack
        .registry
        .update(
            TENANT_A,
            registered.webhook.id,
            harbor_db::models::WebhookUpdate {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let summary = stack.scheduler.process_retry_jobs(10).await;
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 1);
    // No delivery was attempted.
    assert_eq!(capture.request_count(), 1);

    let history = stack
        .registry
        .delivery_history(TENANT_A, registered.webhook.id, None)
        .await
        .unwrap();
    assert_eq!(history[0].status, "failed");
    assert!(history[0]
        .error_message
        .as_deref()
        .is_some_and(|e| e.contains("disabled")));
}

/// Test: the drain respects its batch limit and leaves the rest pending.
#[tokio::test]
async fn test_drain_respects_limit() {
    let stack = test_stack();
    let capture = CaptureResponder::with_status(500);
    let server = mock_endpoint(capture.clone()).await;

    register_webhook(&stack, &server.uri(), &["lead.created"], 2).await;

    for i in 0..3 {
        stack
            .dispatcher
            .trigger("lead.created", &json!({"index": i}), None)
            .await;
    }
    assert_eq!(capture.request_count(), 3);

    let summary = stack.scheduler.process_retry_jobs(2).await;
    assert_eq!(summary.processed, 2);

    let summary = stack.scheduler.process_retry_jobs(2).await;
    assert_eq!(summary.processed, 1);
}
