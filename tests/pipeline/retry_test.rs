//! Rate-limit backoff tests under a paused tokio clock.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tastemate::qloo::retry::{with_rate_limit_retry, RetryPolicy};
use tastemate::qloo::QlooError;

fn rate_limited() -> QlooError {
    QlooError::Status {
        status: 429,
        message: "too many requests".to_owned(),
    }
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_collapse_into_rate_limited_after_full_backoff() {
    let policy = RetryPolicy {
        max_attempts: 3,
        backoff_base_ms: 1000,
    };
    let calls = AtomicU32::new(0);
    let started = tokio::time::Instant::now();

    let result: Result<u32, QlooError> = with_rate_limit_retry(&policy, |_attempt| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err(rate_limited()) }
    })
    .await;

    match result {
        Err(QlooError::RateLimited { attempts }) => assert_eq!(attempts, 3),
        other => panic!("expected rate-limited error, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // 1s after the first attempt, 2s after the second: 3s total.
    assert_eq!(started.elapsed(), Duration::from_millis(3000));
}

#[tokio::test(start_paused = true)]
async fn success_after_one_rate_limit_waits_the_base_delay_only() {
    let policy = RetryPolicy {
        max_attempts: 3,
        backoff_base_ms: 1000,
    };
    let started = tokio::time::Instant::now();

    let result = with_rate_limit_retry(&policy, |attempt| async move {
        if attempt == 1 {
            Err(rate_limited())
        } else {
            Ok(attempt)
        }
    })
    .await;

    assert_eq!(result.expect("should succeed"), 2);
    assert_eq!(started.elapsed(), Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn non_rate_limit_errors_fail_immediately() {
    let policy = RetryPolicy::default();
    let calls = AtomicU32::new(0);
    let started = tokio::time::Instant::now();

    let result: Result<u32, QlooError> = with_rate_limit_retry(&policy, |_attempt| {
        calls.fetch_add(1, Ordering::SeqCst);
        async {
            Err(QlooError::Status {
                status: 500,
                message: "server error".to_owned(),
            })
        }
    })
    .await;

    assert!(matches!(
        result,
        Err(QlooError::Status { status: 500, .. })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test]
async fn configurable_attempt_budget_is_respected() {
    let policy = RetryPolicy {
        max_attempts: 1,
        backoff_base_ms: 1,
    };
    let calls = AtomicU32::new(0);

    let result: Result<u32, QlooError> = with_rate_limit_retry(&policy, |_attempt| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err(rate_limited()) }
    })
    .await;

    assert!(matches!(result, Err(QlooError::RateLimited { attempts: 1 })));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
