//! Bounded retry for transient delivery faults.

use std::future::Future;
use std::time::Duration;

use crate::error::DeliveryError;

/// How many times a delivery is retried, and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retries: u32,
    /// Fixed wait before each retry
    pub delay: Duration,
}

impl RetryPolicy {
    /// Never retry.
    pub const fn none() -> Self {
        Self {
            retries: 0,
            delay: Duration::ZERO,
        }
    }

    /// Retry `retries` times, waiting `delay_ms` before each retry.
    pub const fn fixed(retries: u32, delay_ms: u64) -> Self {
        Self {
            retries,
            delay: Duration::from_millis(delay_ms),
        }
    }

    /// Total attempts including the first.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    /// One retry after one second.
    fn default() -> Self {
        Self::fixed(1, 1000)
    }
}

/// Run `attempt` until it succeeds, fails permanently, or runs out of retries.
///
/// Only `DeliveryError::Transient` is retried. The closure receives the
/// zero-based attempt index. The delay blocks the calling task, so a stalled
/// backend throttles the stream instead of buffering.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut attempt: F,
) -> Result<T, DeliveryError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, DeliveryError>>,
{
    let mut index = 0;
    loop {
        match attempt(index).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && index < policy.retries => {
                index += 1;
                tracing::warn!(
                    "{label}: {e}; retry {index}/{} in {:?}",
                    policy.retries,
                    policy.delay
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
