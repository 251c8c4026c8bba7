//! Exponential backoff for rate-limited calls.
//!
//! Only HTTP 429 is retried; every other failure propagates immediately.
//! The attempt count and base delay are configuration, not invariants.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::QlooError;

/// Retry policy for rate-limited requests.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts (including the first).
    pub max_attempts: u32,
    /// Base delay in milliseconds; attempt `n` waits `base * 2^(n-1)`.
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after a failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }
}

/// Run `op`, retrying on HTTP 429 with exponential backoff.
///
/// `op` receives the 1-based attempt number. After the final rate-limited
/// attempt the error collapses into [`QlooError::RateLimited`], which is
/// distinct from a generic fetch failure.
///
/// # Errors
///
/// Returns the operation's own error for any non-429 failure, or
/// [`QlooError::RateLimited`] once the attempt budget is exhausted.
pub async fn with_rate_limit_retry<T, F, Fut>(
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, QlooError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, QlooError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    for attempt in 1..=max_attempts {
        match op(attempt).await {
            Err(QlooError::Status { status: 429, .. }) => {
                if attempt == max_attempts {
                    return Err(QlooError::RateLimited {
                        attempts: max_attempts,
                    });
                }
                let delay = policy.delay_after(attempt);
                warn!(
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            other => return other,
        }
    }
    Err(QlooError::RateLimited {
        attempts: max_attempts,
    })
}
