//! Backoff-retry for throttled provider calls.
//!
//! Only [`ProviderError::Throttled`] is retried. Any other error, or a
//! throttle once the budget is spent, is returned as-is.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use alertscale_core::{ProviderError, ProviderResult, RetryPolicy};

/// Delays following the Fibonacci series in seconds (1, 1, 2, 3, 5, …),
/// capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    previous: Duration,
    current: Duration,
    max_delay: Duration,
}

impl FibonacciBackoff {
    pub fn new(max_delay: Duration) -> Self {
        Self {
            previous: Duration::ZERO,
            current: Duration::from_secs(1).min(max_delay),
            max_delay,
        }
    }
}

impl Iterator for FibonacciBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let delay = self.current;
        let next = self.current.saturating_add(self.previous).min(self.max_delay);
        self.previous = self.current;
        self.current = next;
        Some(delay)
    }
}

/// Run `call` until it stops failing with a throttle, sleeping between
/// attempts.
///
/// The budget is measured from the first attempt. A throttle seen after
/// the budget has passed ends the loop with that throttle error.
pub async fn throttled_call<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let deadline = Instant::now() + policy.budget;
    let mut backoff = FibonacciBackoff::new(policy.max_delay);
    let mut attempt: u32 = 1;

    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_throttled() => {
                debug!(operation, attempt, error = %err, "provider call failed");
                return Err(err);
            }
            Err(err) => {
                if Instant::now() > deadline {
                    warn!(
                        operation,
                        attempts = attempt,
                        budget_secs = policy.budget.as_secs(),
                        "retry budget exhausted"
                    );
                    return Err(err);
                }

                let delay = backoff.next().unwrap_or(policy.max_delay);
                debug!(
                    operation,
                    attempt,
                    delay_secs = delay.as_secs(),
                    error = %err,
                    "throttled, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
