//! Tests for the tiered retry policy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use threadloop::error::ThreadError;
use threadloop::util::retry::{RetryPolicy, RetryTier};

fn rate_limited() -> ThreadError {
    ThreadError::RateLimited {
        retry_after_ms: None,
    }
}

fn server_error() -> ThreadError {
    ThreadError::api(503, "overloaded")
}

/// Run `policy` against a scripted sequence of failures, then success.
async fn run_script(
    policy: &RetryPolicy,
    failures: Vec<ThreadError>,
) -> (Result<&'static str, ThreadError>, usize, Duration) {
    let script = Arc::new(Mutex::new(failures.into_iter()));
    let attempts = Arc::new(AtomicUsize::new(0));
    let started = Instant::now();

    let result = policy
        .execute(|| {
            let script = script.clone();
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                match script.lock().unwrap().next() {
                    Some(error) => Err(error),
                    None => Ok("ok"),
                }
            }
        })
        .await;

    (result, attempts.load(Ordering::SeqCst), started.elapsed())
}

#[tokio::test(start_paused = true)]
async fn rate_limits_back_off_five_then_ten_seconds() {
    let policy = RetryPolicy::default();
    let (result, attempts, elapsed) =
        run_script(&policy, vec![rate_limited(), rate_limited()]).await;

    assert_eq!(result.unwrap(), "ok");
    assert_eq!(attempts, 3);
    assert_eq!(elapsed, Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn transient_errors_back_off_two_then_four_seconds() {
    let policy = RetryPolicy::default();
    let (result, attempts, elapsed) =
        run_script(&policy, vec![server_error(), ThreadError::Timeout(100)]).await;

    assert_eq!(result.unwrap(), "ok");
    assert_eq!(attempts, 3);
    assert_eq!(elapsed, Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn outer_retry_resets_the_inner_tier() {
    let policy = RetryPolicy::default();
    let failures = vec![
        server_error(),
        server_error(),
        rate_limited(),
        server_error(),
        server_error(),
    ];
    let (result, attempts, elapsed) = run_script(&policy, failures).await;

    assert_eq!(result.unwrap(), "ok");
    assert_eq!(attempts, 6);
    assert_eq!(elapsed, Duration::from_secs(2 + 4 + 5 + 2 + 4));
}

#[tokio::test(start_paused = true)]
async fn exhausted_tier_returns_the_last_error() {
    let policy = RetryPolicy::default();
    let failures = vec![rate_limited(), rate_limited(), rate_limited(), rate_limited()];
    let (result, attempts, elapsed) = run_script(&policy, failures).await;

    assert!(matches!(result, Err(ThreadError::RateLimited { .. })));
    assert_eq!(attempts, 3);
    assert_eq!(elapsed, Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn non_retryable_errors_fail_immediately() {
    let policy = RetryPolicy::default();
    let (result, attempts, elapsed) = run_script(
        &policy,
        vec![ThreadError::Configuration("Missing OPENAI_API_KEY".into())],
    )
    .await;

    assert!(matches!(result, Err(ThreadError::Configuration(_))));
    assert_eq!(attempts, 1);
    assert_eq!(elapsed, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn custom_tiers_apply_their_own_schedule() {
    let policy = RetryPolicy::none().with_tier(RetryTier {
        max_attempts: 2,
        initial_backoff: Duration::from_millis(100),
        ..RetryTier::transient()
    });
    let (result, attempts, elapsed) =
        run_script(&policy, vec![server_error(), server_error()]).await;

    assert!(matches!(result, Err(ThreadError::Api { status: 503, .. })));
    assert_eq!(attempts, 2);
    assert_eq!(elapsed, Duration::from_millis(100));
}
