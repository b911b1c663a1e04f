//! Tests for error classification.

use threadloop::error::{ErrorCategory, RecoverySuggestion, ThreadError};

#[test]
fn status_codes_map_to_categories() {
    assert_eq!(ThreadError::api(401, "").category(), ErrorCategory::Authentication);
    assert_eq!(ThreadError::api(429, "").category(), ErrorCategory::RateLimit);
    assert_eq!(ThreadError::api(502, "").category(), ErrorCategory::Server);
    assert_eq!(ThreadError::api(400, "").category(), ErrorCategory::Api);
}

#[test]
fn retry_predicates_split_rate_limits_from_transient_failures() {
    let throttled = ThreadError::RateLimited {
        retry_after_ms: Some(500),
    };
    assert!(throttled.is_rate_limit());
    assert!(!throttled.is_transient());

    let overloaded = ThreadError::api(529, "overloaded");
    assert!(overloaded.is_transient());
    assert!(!overloaded.is_rate_limit());

    assert!(ThreadError::Timeout(30_000).is_retryable());
    assert!(!ThreadError::Configuration("missing key".into()).is_retryable());
    assert!(!ThreadError::ToolNotFound("txt2img".into()).is_retryable());
}

#[test]
fn tool_errors_read_naturally() {
    assert_eq!(
        ThreadError::ToolNotFound("txt2img".into()).to_string(),
        "Tool txt2img not found."
    );
    let failure = ThreadError::ToolReportedFailure {
        tool_name: "txt2img".into(),
        message: "out of credits".into(),
    };
    assert_eq!(failure.category(), ErrorCategory::ToolExecution);
    assert_eq!(
        failure.recovery_suggestion(),
        RecoverySuggestion::CheckToolImplementation
    );
}

#[test]
fn chat_rate_limit_suggests_waiting() {
    let err = ThreadError::ChatRateLimitExceeded {
        user_id: "u1".into(),
    };
    assert_eq!(err.category(), ErrorCategory::ChatRateLimit);
    assert_eq!(err.recovery_suggestion(), RecoverySuggestion::WaitForQuota);
    assert!(!err.is_retryable());
}
