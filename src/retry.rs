use std::future::Future;
use std::time::Duration;

use crate::store::StoreResult;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
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

    /// Delay slept after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

/// Run `operation` until it succeeds, fails permanently, or runs out of attempts.
///
/// Only transient store errors are retried. The last error is returned once
/// attempts are exhausted.
pub async fn with_retry<T, O, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: O,
) -> StoreResult<T>
where
    O: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !error.is_transient() || attempt >= policy.max_attempts {
                    return Err(error);
                }
                let backoff = policy.delay_for(attempt);
                tracing::warn!(
                    target: "vaultferry",
                    event = "store_retry",
                    operation = label,
                    attempt,
                    max_attempts = policy.max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %error
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
}
