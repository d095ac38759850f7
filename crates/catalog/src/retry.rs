use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::lookup::TransportFailure;

/// Errors that know whether repeating the same GET could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for TransportFailure {
    fn is_retryable(&self) -> bool {
        match self {
            TransportFailure::Connection(_) => true,
            TransportFailure::Http { status, .. } => matches!(status, 502 | 503 | 504),
            // a timed-out attempt already spent the whole call budget
            TransportFailure::Timeout | TransportFailure::CircuitOpen => false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
    enabled: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_base: Duration, backoff_max: Duration, enabled: bool) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
            backoff_max,
            enabled,
        }
    }

    pub fn disabled() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO, false)
    }

    pub fn from_config(cfg: &configs::ReferenceServiceConfig) -> Self {
        Self::new(cfg.retry.max_attempts, cfg.backoff_base(), cfg.backoff_max(), cfg.retry.enabled)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn max_attempts(&self) -> u32 {
        if self.enabled {
            self.max_attempts
        } else {
            1
        }
    }

    /// Exponential delay before retry number `attempt` (1-based), capped at `backoff_max`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2_u32.saturating_pow(attempt - 1);
        self.backoff_base.saturating_mul(factor).min(self.backoff_max)
    }

    async fn wait_before_retry(&self, attempt: u32) {
        if !self.enabled || attempt == 0 {
            return;
        }
        let backoff = self.backoff_for(attempt);
        debug!(?backoff, attempt, "retrying reference lookup");
        sleep(backoff).await;
    }

    fn should_retry<E>(&self, attempt: u32, error: &E) -> bool
    where
        E: Retryable + std::fmt::Display,
    {
        if !self.enabled {
            return false;
        }
        if attempt >= self.max_attempts {
            debug!(max_attempts = self.max_attempts, "max retry attempts reached");
            return false;
        }
        if error.is_retryable() {
            true
        } else {
            debug!(%error, "error is not retryable");
            false
        }
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the policy's attempts are used up. Only for idempotent requests.
pub async fn retry_with_policy<F, Fut, T, E>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        if attempt > 0 {
            policy.wait_before_retry(attempt).await;
        }
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(retries = attempt, "reference lookup succeeded after retries");
                }
                return Ok(value);
            }
            Err(error) => {
                attempt += 1;
                if attempt < policy.max_attempts() && policy.should_retry(attempt, &error) {
                    warn!(attempt, %error, "reference lookup attempt failed");
                    continue;
                }
                return Err(error);
            }
        }
    }
}
