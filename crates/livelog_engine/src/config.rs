//! Configuration for the sync engine.

use crate::retry::RetryConfig;
use std::time::Duration;

/// Configuration for one engine instance (one authenticated session).
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Sequence position to resume from; 0 means a fresh session.
    pub resume_from: u64,
    /// Retry behavior for catch-up page fetches. Bounded: exhaustion puts
    /// the engine in the cooldown-and-retry degraded state.
    pub catchup_retry: RetryConfig,
    /// Retry behavior for (re)connecting the push stream and for sequence
    /// probes. Unbounded by default.
    pub reconnect_retry: RetryConfig,
    /// Cooldown before re-running a catch-up whose retries were exhausted.
    pub catchup_cooldown: Duration,
}

impl SyncConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self {
            resume_from: 0,
            catchup_retry: RetryConfig::new(5),
            reconnect_retry: RetryConfig::unbounded(),
            catchup_cooldown: Duration::from_secs(5),
        }
    }

    /// Sets the sequence position to resume from.
    pub fn with_resume_from(mut self, seq: u64) -> Self {
        self.resume_from = seq;
        self
    }

    /// Sets the catch-up retry configuration.
    pub fn with_catchup_retry(mut self, retry: RetryConfig) -> Self {
        self.catchup_retry = retry;
        self
    }

    /// Sets the reconnect retry configuration.
    pub fn with_reconnect_retry(mut self, retry: RetryConfig) -> Self {
        self.reconnect_retry = retry;
        self
    }

    /// Sets the cooldown between exhausted catch-up runs.
    pub fn with_catchup_cooldown(mut self, cooldown: Duration) -> Self {
        self.catchup_cooldown = cooldown;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}
