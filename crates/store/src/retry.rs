//! Bounded retry for transient lock contention.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::Result;

/// Bounded, linear-backoff retry around store operations.
///
/// Only errors whose kind reports [`is_retryable`] are retried; everything
/// else is returned to the caller on the first attempt.
///
/// [`is_retryable`]: crate::error::ErrorKind::is_retryable
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub max_attempts: u32,
    /// Base delay; attempt `n` sleeps `n * backoff` before retrying.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, backoff: Duration::from_millis(250) }
    }
}

impl RetryPolicy {
    /// Run `op`, retrying retryable failures up to `max_attempts` times.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 1;
        loop {
            match op().await {
                Err(error) if error.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        "store locked; backing off before retry",
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
