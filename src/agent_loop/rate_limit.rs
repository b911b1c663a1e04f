//! Per-user chat rate limiting.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::{Result, ThreadError};

/// Consulted once per prompt, before any model call.
#[async_trait]
pub trait ChatRateLimiter: Send + Sync {
    /// Fails with [`ThreadError::ChatRateLimitExceeded`] when the user is over
    /// their limit.
    async fn check_chat_rate_limit(&self, user_id: &str) -> Result<()>;
}

/// Allows `limit` prompts per user in each fixed window. Users whose
/// window has elapsed are forgotten on the next check.
#[derive(Debug)]
pub struct FixedWindowRateLimiter {
    limit: u32,
    window: Duration,
    counters: Mutex<HashMap<String, (Instant, u32)>>,
}

impl FixedWindowRateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            counters: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ChatRateLimiter for FixedWindowRateLimiter {
    async fn check_chat_rate_limit(&self, user_id: &str) -> Result<()> {
        let now = Instant::now();
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| ThreadError::InvalidState("rate limiter poisoned".into()))?;
        counters.retain(|_, (started, _)| now.duration_since(*started) < self.window);
        let entry = counters.entry(user_id.to_string()).or_insert((now, 0));
        if entry.1 >= self.limit {
            return Err(ThreadError::ChatRateLimitExceeded {
                user_id: user_id.to_string(),
            });
        }
        entry.1 += 1;
        Ok(())
    }
}
