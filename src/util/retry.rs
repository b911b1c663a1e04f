//! Tiered retry with exponential backoff.
//!
//! A [`RetryPolicy`] is an ordered list of [`RetryTier`]s, innermost first.
//! Each tier retries only the errors its predicate accepts. When an outer
//! tier retries, every tier inside it starts counting again, which is the
//! behavior of stacking one retry wrapper around another.

use std::future::Future;
use std::time::Duration;

use crate::error::ThreadError;

/// Decides whether a tier handles an error.
pub type RetryPredicate = fn(&ThreadError) -> bool;

/// One layer of retry behavior.
#[derive(Clone)]
pub struct RetryTier {
    /// Label used in logs.
    pub name: &'static str,
    /// Errors this tier retries.
    pub predicate: RetryPredicate,
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Backoff after the first failed attempt.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff growth factor per attempt.
    pub multiplier: f64,
}

impl std::fmt::Debug for RetryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryTier")
            .field("name", &self.name)
            .field("max_attempts", &self.max_attempts)
            .field("initial_backoff", &self.initial_backoff)
            .field("max_backoff", &self.max_backoff)
            .field("multiplier", &self.multiplier)
            .finish()
    }
}

impl RetryTier {
    /// Upstream rate limiting: 5, 10, 20 ... seconds, capped at 60, 3 attempts.
    pub fn rate_limit() -> Self {
        Self {
            name: "rate_limit",
            predicate: ThreadError::is_rate_limit,
            max_attempts: 3,
            initial_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }

    /// Connection and server errors: 2, 4, 8 ... seconds, capped at 30, 3 attempts.
    pub fn transient() -> Self {
        Self {
            name: "transient",
            predicate: ThreadError::is_transient,
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }

    pub fn handles(&self, error: &ThreadError) -> bool {
        (self.predicate)(error)
    }

    /// Wait after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_backoff.as_secs_f64()))
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Tiers ordered innermost first.
    pub tiers: Vec<RetryTier>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::model_calls()
    }
}

impl RetryPolicy {
    /// Policy guarding model invocations: transient errors retried inside,
    /// rate limits retried outside.
    pub fn model_calls() -> Self {
        Self {
            tiers: vec![RetryTier::transient(), RetryTier::rate_limit()],
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self { tiers: Vec::new() }
    }

    pub fn with_tier(mut self, tier: RetryTier) -> Self {
        self.tiers.push(tier);
        self
    }

    /// Execute an async operation with retry. The final error is returned
    /// unchanged once every applicable tier is exhausted.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, ThreadError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ThreadError>>,
    {
        let mut attempts = vec![1u32; self.tiers.len()];

        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            let level = self.tiers.iter().enumerate().position(|(i, tier)| {
                tier.handles(&error) && attempts[i] < tier.max_attempts.max(1)
            });
            let Some(level) = level else {
                return Err(error);
            };

            let tier = &self.tiers[level];
            let attempt = attempts[level];
            let wait = tier.backoff(attempt);
            tracing::warn!(
                tier = tier.name,
                attempt,
                max_attempts = tier.max_attempts,
                backoff_ms = wait.as_millis() as u64,
                error = %error,
                "Retrying after error"
            );
            tokio::time::sleep(wait).await;

            attempts[level] += 1;
            for inner in attempts.iter_mut().take(level) {
                *inner = 1;
            }
        }
    }
}
