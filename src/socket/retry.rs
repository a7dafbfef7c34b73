//! Fixed-delay retry policy for initiating sockets.
//!
//! Transient connect errors are retried after a constant delay. Attempts are
//! unbounded unless a cap is configured.

use std::time::Duration;

/// Delay between a transient failure and the next attempt.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
    /// Total connect attempts allowed, first one included. `None` = unbounded.
    pub max_attempts: Option<usize>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { delay: DEFAULT_RETRY_DELAY, max_attempts: None }
    }
}

impl RetryPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self { delay, max_attempts: None }
    }

    /// Whether another attempt may follow `attempts` failed ones.
    pub fn should_retry(&self, attempts: usize) -> bool {
        self.max_attempts.map_or(true, |max| attempts < max)
    }
}
