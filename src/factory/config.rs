//! Factory configuration.

use crate::socket::retry::{RetryPolicy, DEFAULT_RETRY_DELAY};
use serde::Deserialize;
use std::time::Duration;

/// Reason used when the factory shuts down without an explicit one
/// (e.g. the last handle is dropped).
pub const DEFAULT_SHUTDOWN_REASON: &str = "transport factory terminated";

/// Factory configuration.
///
/// Deserializable so hosts can load it from their own config files; missing
/// fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    /// Delay before re-attempting after a transient socket error, in milliseconds.
    pub retry_delay_ms: u64,
    /// Cap on connect attempts per slot. `None` retries forever.
    pub max_connect_attempts: Option<usize>,
    /// Reason given to pending callers on an implicit shutdown.
    pub shutdown_reason: String,
    /// Close channels delivered by deduplicating kinds on an explicit
    /// [`Factory::shutdown`](crate::factory::Factory::shutdown). Off by default:
    /// a delivered channel belongs to the caller. Dropping the factory never
    /// closes channels.
    pub close_channels_on_shutdown: bool,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: DEFAULT_RETRY_DELAY.as_millis() as u64,
            max_connect_attempts: None,
            shutdown_reason: DEFAULT_SHUTDOWN_REASON.to_string(),
            close_channels_on_shutdown: false,
        }
    }
}

impl FactoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object; absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Set the retry delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Cap connect attempts per slot.
    pub fn with_max_connect_attempts(mut self, attempts: usize) -> Self {
        self.max_connect_attempts = Some(attempts);
        self
    }

    pub fn with_shutdown_reason(mut self, reason: impl Into<String>) -> Self {
        self.shutdown_reason = reason.into();
        self
    }

    pub fn with_close_channels_on_shutdown(mut self, close: bool) -> Self {
        self.close_channels_on_shutdown = close;
        self
    }

    pub(crate) fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy { delay: self.retry_delay(), max_attempts: self.max_connect_attempts }
    }
}
