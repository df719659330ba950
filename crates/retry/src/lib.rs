//! Bounded retries with exponential backoff for remote calls.
//!
//! Every remote call of the bridge (starting a workflow, writing a row) goes
//! through [`RetryingClient::execute`], each call site supplying its own
//! [`RetryConfig`].

use model::Retryable;
use model::env::BridgeConfig;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(20_000);
pub const DEFAULT_FACTOR: u32 = 2;

/// Exponential backoff without jitter: `base_delay * factor ^ attempt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub factor: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy {
            base_delay: DEFAULT_BASE_DELAY,
            factor: DEFAULT_FACTOR,
        }
    }
}

impl BackoffPolicy {
    pub const fn new(base_delay: Duration, factor: u32) -> Self {
        BackoffPolicy { base_delay, factor }
    }

    /// Delay to wait before retry number `attempt`.
    /// Saturates at `Duration::MAX` rather than overflowing.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.factor
            .checked_pow(attempt)
            .and_then(|multiplier| self.base_delay.checked_mul(multiplier))
            .unwrap_or(Duration::MAX)
    }
}

/// Whole milliseconds of `delay`, clamped to `u64::MAX`.
fn whole_millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries allowed after the initial attempt.
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl RetryConfig {
    pub const fn new(max_attempts: u32, backoff: BackoffPolicy) -> Self {
        RetryConfig {
            max_attempts,
            backoff,
        }
    }

    /// Retry settings for starting a workflow execution.
    pub fn dispatch(config: &BridgeConfig) -> Self {
        RetryConfig::new(
            config.max_retry_attempts,
            BackoffPolicy::new(config.dispatch_base_delay, config.delay_factor),
        )
    }

    /// Retry settings for writing a mutation record.
    pub fn mutation(config: &BridgeConfig) -> Self {
        RetryConfig::new(
            config.max_retry_attempts,
            BackoffPolicy::new(config.mutation_base_delay, config.delay_factor),
        )
    }
}

/// Runs a single remote operation, retrying the failures it classifies as retryable.
#[derive(Debug, Clone)]
pub struct RetryingClient {
    name: &'static str,
    config: RetryConfig,
}

impl RetryingClient {
    pub fn new(name: &'static str, config: RetryConfig) -> Self {
        RetryingClient { name, config }
    }

    /// Invoke `operation` until it succeeds, fails without being retryable,
    /// or `max_attempts` retries have been spent.
    ///
    /// The final error is returned exactly as the operation produced it.
    pub async fn execute<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut attempt: u32 = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::debug!(operation = self.name, attempt, "Succeeded after retry");
                    }

                    return Ok(value);
                }
                Err(err) if err.is_retryable() && attempt < self.config.max_attempts => {
                    attempt += 1;
                    let delay: Duration = self.config.backoff.delay(attempt);

                    tracing::warn!(
                        operation = self.name,
                        attempt,
                        delay_ms = whole_millis(delay),
                        "Retryable failure: {err}"
                    );

                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    tracing::error!(
                        operation = self.name,
                        attempt,
                        retryable = err.is_retryable(),
                        "Giving up: {err}"
                    );

                    return Err(err);
                }
            }
        }
    }
}
