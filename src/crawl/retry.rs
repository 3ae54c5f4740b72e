//! Linear backoff for browser calls that fail on lost connectivity.

use std::time::Duration;

use tracing::warn;

use crate::error::{ScrapeError, ScrapeResult};

/// Wait parameters for connectivity retries.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Base wait.
    pub timeout: Duration,
    /// Growth of the wait per failed attempt.
    pub multiplier: f64,
    /// Retries allowed per call.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            multiplier: 1.0,
            max_attempts: 10,
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `attempt` (0-based): `(1 + attempt * multiplier) * timeout`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1.0 + attempt as f64 * self.multiplier.max(0.0);
        self.timeout.mul_f64(factor)
    }

    /// Start a fresh retry sequence for one call.
    pub fn start(&self) -> Retry<'_> {
        Retry {
            policy: self,
            attempt: 0,
        }
    }
}

/// Per-call retry counter.
///
/// ```ignore
/// let mut retry = policy.start();
/// loop {
///     match driver.navigate(url).await {
///         Err(DriverError::Disconnected(msg)) => retry.wait("navigate", &msg).await?,
///         other => break other?,
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Retry<'a> {
    policy: &'a RetryPolicy,
    attempt: u32,
}

impl Retry<'_> {
    /// Failed attempts so far.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Sleep before the next attempt, or fail once the retries are used up.
    pub async fn wait(&mut self, operation: &str, reason: &str) -> ScrapeResult<()> {
        if self.attempt >= self.policy.max_attempts {
            return Err(ScrapeError::RetriesExhausted {
                operation: operation.to_string(),
                attempts: self.attempt,
                reason: reason.to_string(),
            });
        }

        let delay = self.policy.delay_for(self.attempt);
        warn!(
            "{} failed ({}), retry {}/{} in {:.1}s",
            operation,
            reason,
            self.attempt + 1,
            self.policy.max_attempts,
            delay.as_secs_f64()
        );
        self.attempt += 1;
        tokio::time::sleep(delay).await;
        Ok(())
    }
}
