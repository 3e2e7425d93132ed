//! Bounded exponential backoff for chain calls.
//!
//! Only transient failures (transport errors, timeouts, rate limits) are
//! retried. Terminal failures return immediately.

use std::future::Future;
use std::time::Duration;

/// Attempt cap and base delay. Delays double after every failure:
/// 200ms → 400ms → 800ms with the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failed attempts tolerated before giving up.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay after the `failures`-th failure (1-based).
    pub fn delay_after(&self, failures: u32) -> Duration {
        let exp = failures.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exp)
    }
}

/// How an attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    Transient(String),
    Terminal(String),
}

impl AttemptError {
    pub fn message(&self) -> &str {
        match self {
            Self::Transient(m) | Self::Terminal(m) => m,
        }
    }
}

/// Running count of failures shared by several retried steps.
#[derive(Debug)]
pub struct RetryBudget {
    policy: RetryPolicy,
    failures: u32,
}

impl RetryBudget {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            failures: 0,
        }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Run `f` until it succeeds, fails terminally, or the shared budget is
    /// spent. Each attempt is bounded by `timeout`.
    pub async fn run<T, F, Fut>(
        &mut self,
        step: &'static str,
        timeout: Duration,
        mut f: F,
    ) -> Result<T, AttemptError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
    {
        loop {
            let outcome = match tokio::time::timeout(timeout, f()).await {
                Ok(result) => result,
                Err(_) => Err(AttemptError::Transient(format!(
                    "{step} timed out after {timeout:?}"
                ))),
            };
            let e = match outcome {
                Ok(value) => return Ok(value),
                Err(e @ AttemptError::Terminal(_)) => return Err(e),
                Err(e) => e,
            };
            self.failures += 1;
            if self.failures >= self.policy.max_attempts {
                tracing::warn!(
                    step,
                    attempts = self.failures,
                    "Retry budget exhausted: {}",
                    e.message()
                );
                return Err(e);
            }
            let delay = self.policy.delay_after(self.failures);
            tracing::warn!(
                step,
                attempt = self.failures,
                max_attempts = self.policy.max_attempts,
                "Chain call failed, retrying in {delay:?}: {}",
                e.message()
            );
            tokio::time::sleep(delay).await;
        }
    }
}
