//! Bounded retry with linear backoff.

use beacon_core::error::BeaconError;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// How many attempts to make and how long to wait between them.
///
/// Before retry `n` (after `n` failed attempts) the loop sleeps
/// `base_delay * n`, so the default policy waits 1s, then 2s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Same delay unit, different attempt budget.
    pub fn with_attempts(self, max_attempts: u32) -> Self {
        Self::new(max_attempts, self.base_delay)
    }

    /// Delay after `failed` attempts have failed.
    pub fn delay_for(&self, failed: u32) -> Duration {
        self.base_delay.saturating_mul(failed)
    }
}

/// Run `op` until it succeeds, the budget runs out, or it returns an error
/// that is not transient. The last error is returned on exhaustion.
pub async fn retry<T, F, Fut>(policy: RetryPolicy, what: &str, op: F) -> Result<T, BeaconError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, BeaconError>>,
{
    retry_while(policy, what, op, BeaconError::is_transient).await
}

/// Like [`retry`], but every error uses up an attempt instead of ending
/// the loop early.
pub async fn retry_all<T, F, Fut>(policy: RetryPolicy, what: &str, op: F) -> Result<T, BeaconError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, BeaconError>>,
{
    retry_while(policy, what, op, |_| true).await
}

async fn retry_while<T, F, Fut>(
    policy: RetryPolicy,
    what: &str,
    mut op: F,
    retryable: fn(&BeaconError) -> bool,
) -> Result<T, BeaconError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, BeaconError>>,
{
    let max = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if !retryable(&e) => {
                error!("{what} failed with non-retryable error: {e}");
                return Err(e);
            }
            Err(e) if attempt >= max => {
                error!("{what} attempt {attempt}/{max} failed: {e}, giving up");
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "{what} attempt {attempt}/{max} failed: {e}, retrying in {}ms",
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
