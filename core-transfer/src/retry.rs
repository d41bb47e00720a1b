//! Exponential backoff around single store calls.

use crate::error::{Result, TransferError};
use core_async::sync::CancellationToken;
use core_async::time::{sleep, Duration};
use core_runtime::config::TransferConfig;
use std::future::Future;
use tracing::{debug, warn};

/// Retry budget and backoff curve shared by every store call of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &TransferConfig) -> Self {
        Self::new(
            config.max_retries,
            config.retry_base_delay,
            config.retry_max_delay,
        )
    }

    /// A single attempt, no retries
    pub fn no_retry() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Backoff before retry `n` (1-based): `min(base * 2^(n-1), max)`
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        2u32.checked_pow(exponent)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Runs `op` until it succeeds, fails permanently or the budget runs out
    ///
    /// Returns the outcome together with the number of attempts made. A
    /// cancelled token stops further retries but never interrupts an attempt
    /// already in flight.
    pub async fn run<T, F, Fut>(
        &self,
        op_name: &str,
        cancel: Option<&CancellationToken>,
        mut op: F,
    ) -> (Result<T>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bridge_traits::error::Result<T>>,
    {
        let is_cancelled = || cancel.map_or(false, |token| token.is_cancelled());
        let mut attempts = 0u32;

        loop {
            if attempts > 0 && is_cancelled() {
                return (Err(TransferError::Cancelled), attempts);
            }

            attempts += 1;
            let error = match op().await {
                Ok(value) => return (Ok(value), attempts),
                Err(error) => error,
            };

            if !error.is_retryable() {
                debug!(op = op_name, attempt = attempts, error = %error, "Non-retryable failure");
                return (Err(TransferError::Store(error)), attempts);
            }

            if attempts > self.max_retries {
                warn!(op = op_name, attempts, error = %error, "Retries exhausted");
                return (
                    Err(TransferError::RetriesExhausted {
                        attempts,
                        source: Box::new(TransferError::Store(error)),
                    }),
                    attempts,
                );
            }

            let delay = self.delay_for(attempts);
            debug!(
                op = op_name,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying after transient failure"
            );

            if is_cancelled() {
                return (Err(TransferError::Cancelled), attempts);
            }
            sleep(delay).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&TransferConfig::default())
    }
}
