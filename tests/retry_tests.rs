// Retry policy behavior tests

use flrts_gateway::utils::retry::{FailureKind, RetryPolicy, TransportError, TransportErrorKind};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn counting() -> (Arc<AtomicU32>, impl Fn() -> u32) {
    let counter = Arc::new(AtomicU32::new(0));
    let handle = counter.clone();
    (counter, move || handle.fetch_add(1, Ordering::SeqCst) + 1)
}

#[tokio::test(start_paused = true)]
async fn test_succeeds_on_third_attempt_with_backoff() {
    let policy = RetryPolicy::default();
    let (_, next_attempt) = counting();
    let started = Instant::now();

    let outcome = policy
        .run("flaky_send", move || {
            let attempt = next_attempt();
            async move {
                if attempt < 3 {
                    Err(TransportError::status(500, "internal server error"))
                } else {
                    Ok("delivered")
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(outcome.value, "delivered");
    assert_eq!(outcome.attempts, 3);

    // Two backoff sleeps: 1s * 2^0 + 1s * 2^1.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(3));
    assert!(elapsed < Duration::from_millis(3100));
}

#[tokio::test(start_paused = true)]
async fn test_terminal_error_stops_after_first_attempt() {
    let policy = RetryPolicy::default();
    let (attempts, next_attempt) = counting();
    let started = Instant::now();

    let failure = policy
        .run("doomed_send", move || {
            next_attempt();
            async { Err::<(), _>(TransportError::status(404, "chat not found")) }
        })
        .await
        .unwrap_err();

    assert_eq!(failure.kind, FailureKind::Terminal);
    assert_eq!(failure.attempts, 1);
    assert_eq!(failure.cause.status_code(), Some(404));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    // No retry, so no backoff sleep either.
    assert!(started.elapsed() < Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn test_connection_refused_exhausts_attempts() {
    let policy = RetryPolicy::default();
    let (attempts, next_attempt) = counting();

    let failure = policy
        .run("unreachable_send", move || {
            next_attempt();
            async { Err::<(), _>(TransportError::connection_refused("connection refused")) }
        })
        .await
        .unwrap_err();

    assert_eq!(failure.kind, FailureKind::RetriesExhausted);
    assert_eq!(failure.attempts, 3);
    assert_eq!(failure.cause.kind, TransportErrorKind::ConnectionRefused);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_hint_overrides_backoff() {
    let policy = RetryPolicy::default();
    let (_, next_attempt) = counting();
    let started = Instant::now();

    let outcome = policy
        .run("hinted_send", move || {
            let attempt = next_attempt();
            async move {
                if attempt == 1 {
                    Err(TransportError::status(503, "busy")
                        .with_retry_after(Duration::from_secs(7)))
                } else {
                    Ok(())
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(outcome.attempts, 2);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(7));
    assert!(elapsed < Duration::from_millis(7100));
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_hint_is_capped() {
    let policy = RetryPolicy {
        max_attempts: 2,
        base_delay: Duration::from_secs(1),
        backoff_multiplier: 2.0,
        max_delay: Some(Duration::from_secs(2)),
    };
    let (_, next_attempt) = counting();
    let started = Instant::now();

    let outcome = policy
        .run("overeager_hint", move || {
            let attempt = next_attempt();
            async move {
                if attempt == 1 {
                    Err(TransportError::status(503, "busy")
                        .with_retry_after(Duration::from_secs(120)))
                } else {
                    Ok(())
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(outcome.attempts, 2);
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_single_attempt_policy() {
    let policy = RetryPolicy {
        max_attempts: 1,
        ..RetryPolicy::default()
    };
    let (attempts, next_attempt) = counting();

    let failure = policy
        .run("one_shot", move || {
            next_attempt();
            async { Err::<(), _>(TransportError::timeout("deadline elapsed")) }
        })
        .await
        .unwrap_err();

    assert_eq!(failure.kind, FailureKind::RetriesExhausted);
    assert_eq!(failure.attempts, 1);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_success_reports_single_attempt() {
    let policy = RetryPolicy::default();
    let outcome = policy
        .run("healthy_send", || async { Ok::<_, TransportError>(42) })
        .await
        .unwrap();
    assert_eq!(outcome.value, 42);
    assert_eq!(outcome.attempts, 1);
}
