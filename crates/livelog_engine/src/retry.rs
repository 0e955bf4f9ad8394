//! Retry policy with exponential backoff and jitter.
//!
//! The policy is an explicit, injected object rather than ad-hoc wrapping
//! of individual calls: every network operation the engine performs goes
//! through [`RetryPolicy::run`], and the backoff behavior is unit-testable
//! without a network.

use crate::error::{SyncError, SyncResult};
use crate::shutdown::Shutdown;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts; `None` retries until cancelled.
    pub max_attempts: Option<u32>,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a bounded retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a configuration that retries until cancelled.
    ///
    /// This is the reconnect policy: a sync engine must not give up
    /// permanently on transient network loss.
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: Some(1),
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Disables jitter (deterministic delays, mainly for tests).
    pub fn without_jitter(mut self) -> Self {
        self.add_jitter = false;
        self
    }

    /// Calculates the delay for a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);

        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            // Up to 25% jitter
            let jitter = delay_secs * 0.25 * rand::thread_rng().gen::<f64>();
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Executes fallible async operations under a [`RetryConfig`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Creates a policy from a configuration.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the underlying configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Runs `op` until it succeeds, fails non-retryably, exhausts the
    /// attempt budget, or the shutdown signal fires.
    ///
    /// Non-retryable errors return immediately; exhaustion returns the last
    /// error; cancellation returns [`SyncError::Cancelled`] even mid-backoff.
    pub async fn run<T, F, Fut>(&self, shutdown: &mut Shutdown, mut op: F) -> SyncResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            if attempt > 0 {
                let delay = self.config.delay_for_attempt(attempt);
                tokio::select! {
                    biased;
                    _ = shutdown.triggered() => return Err(SyncError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let result = tokio::select! {
                biased;
                _ = shutdown.triggered() => return Err(SyncError::Cancelled),
                result = op() => result,
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => {
                    attempt += 1;
                    if let Some(max) = self.config.max_attempts {
                        if attempt >= max {
                            return Err(err);
                        }
                    }
                    warn!(attempt, error = %err, "operation failed, backing off");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Instant;

    #[test]
    fn first_attempt_has_no_delay() {
        let config = RetryConfig::new(5);
        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
    }

    #[test]
    fn delays_grow_exponentially_without_jitter() {
        let config = RetryConfig::new(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0)
            .without_jitter();

        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let config = RetryConfig::new(5).with_initial_delay(Duration::from_millis(100));

        for _ in 0..32 {
            let delay = config.delay_for_attempt(1);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(125));
        }
    }

    #[test]
    fn delay_respects_max() {
        let config = RetryConfig::new(10)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(10.0)
            .without_jitter();

        assert_eq!(config.delay_for_attempt(6), Duration::from_secs(5));
    }

    #[test]
    fn unbounded_has_no_attempt_cap() {
        assert_eq!(RetryConfig::unbounded().max_attempts, None);
        assert_eq!(RetryConfig::no_retry().max_attempts, Some(1));
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            RetryConfig::new(max_attempts)
                .with_initial_delay(Duration::from_millis(1))
                .with_max_delay(Duration::from_millis(2))
                .without_jitter(),
        )
    }

    #[tokio::test]
    async fn returns_first_success() {
        let (_tx, mut shutdown) = Shutdown::channel();
        let calls = Cell::new(0u32);

        let result = fast_policy(3)
            .run(&mut shutdown, || {
                calls.set(calls.get() + 1);
                async { Ok::<_, SyncError>(7u64) }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let (_tx, mut shutdown) = Shutdown::channel();
        let calls = Cell::new(0u32);

        let result = fast_policy(5)
            .run(&mut shutdown, || {
                calls.set(calls.get() + 1);
                let attempt = calls.get();
                async move {
                    if attempt < 3 {
                        Err(SyncError::Transport {
                            message: "flaky".into(),
                            retryable: true,
                        })
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn exhaustion_returns_last_error() {
        let (_tx, mut shutdown) = Shutdown::channel();
        let calls = Cell::new(0u32);

        let result: SyncResult<()> = fast_policy(3)
            .run(&mut shutdown, || {
                calls.set(calls.get() + 1);
                async {
                    Err(SyncError::Transport {
                        message: "down".into(),
                        retryable: true,
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(SyncError::Transport { .. })));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_returns_immediately() {
        let (_tx, mut shutdown) = Shutdown::channel();
        let calls = Cell::new(0u32);

        let result: SyncResult<()> = fast_policy(5)
            .run(&mut shutdown, || {
                calls.set(calls.get() + 1);
                async { Err(SyncError::Auth("rejected".into())) }
            })
            .await;

        assert!(matches!(result, Err(SyncError::Auth(_))));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn cancellation_aborts_backoff_wait() {
        let policy = RetryPolicy::new(
            RetryConfig::unbounded()
                .with_initial_delay(Duration::from_secs(60))
                .without_jitter(),
        );
        let (tx, mut shutdown) = Shutdown::channel();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(true);
        });

        let started = Instant::now();
        let result: SyncResult<()> = policy
            .run(&mut shutdown, || async {
                Err(SyncError::Transport {
                    message: "down".into(),
                    retryable: true,
                })
            })
            .await;

        assert!(matches!(result, Err(SyncError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn pre_triggered_shutdown_skips_the_operation() {
        let (tx, mut shutdown) = Shutdown::channel();
        tx.send(true).unwrap();

        let polls = Cell::new(0u32);
        let result: SyncResult<()> = fast_policy(3)
            .run(&mut shutdown, || async {
                polls.set(polls.get() + 1);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(SyncError::Cancelled)));
        assert_eq!(polls.get(), 0);
    }
}
