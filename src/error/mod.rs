//! Error types for threadloop.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

/// Primary error type for all orchestration operations.
#[derive(Error, Debug)]
pub enum ThreadError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Tool {0} not found.")]
    ToolNotFound(String),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Tool {tool_name} reported failure: {message}")]
    ToolReportedFailure { tool_name: String, message: String },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Chat rate limit exceeded for user {user_id}")]
    ChatRateLimitExceeded { user_id: String },

    #[error("Provider error: {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl ThreadError {
    /// Create an API error from a status code and body.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a tool execution error.
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            Self::ToolNotFound(_) => ErrorCategory::ToolResolution,
            Self::ToolExecution { .. } | Self::ToolReportedFailure { .. } => {
                ErrorCategory::ToolExecution
            }
            Self::Persistence(_) => ErrorCategory::Persistence,
            Self::ChatRateLimitExceeded { .. } => ErrorCategory::ChatRateLimit,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Upstream throttling (HTTP 429 and friends).
    pub fn is_rate_limit(&self) -> bool {
        self.category() == ErrorCategory::RateLimit
    }

    /// Transport, connection or server-side failures worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Network | ErrorCategory::Timeout | ErrorCategory::Server
        )
    }

    /// Whether this error is potentially retryable by any tier.
    pub fn is_retryable(&self) -> bool {
        self.is_rate_limit() || self.is_transient()
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::CheckCredentials,
            ErrorCategory::RateLimit
            | ErrorCategory::Network
            | ErrorCategory::Server => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Timeout => RecoverySuggestion::IncreaseTimeout,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::ToolResolution | ErrorCategory::ToolExecution => {
                RecoverySuggestion::CheckToolImplementation
            }
            ErrorCategory::ChatRateLimit => RecoverySuggestion::WaitForQuota,
            _ => RecoverySuggestion::ContactSupport,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ThreadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_retry_classes() {
        assert!(ThreadError::api(429, "slow down").is_rate_limit());
        assert!(ThreadError::api(503, "overloaded").is_transient());
        assert!(!ThreadError::api(400, "bad request").is_retryable());
        assert!(!ThreadError::api(401, "nope").is_retryable());
    }

    #[test]
    fn tool_errors_are_not_retryable() {
        let err = ThreadError::ToolNotFound("image_gen".into());
        assert_eq!(err.category(), ErrorCategory::ToolResolution);
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Tool image_gen not found.");
    }
}
