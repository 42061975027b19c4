//! Resilient remote client
//!
//! Wraps every remote request with two guarantees:
//!
//! 1. **Spacing**: request starts are at least `min_interval` apart across
//!    every caller sharing the client instance.
//! 2. **Retry**: rate-limited and server-unavailable failures are retried
//!    up to `max_attempts` total, honoring an explicit retry hint or else
//!    backing off exponentially with jitter.
//!
//! Permanent failures are returned on the first attempt.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::error::{RemoteError, RemoteResult};

/// Spacing and retry parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Minimum time between the starts of two requests
    pub min_interval: Duration,
    /// Total attempts per operation, including the first
    pub max_attempts: u32,
    /// Delay before the first retry when no hint is given
    pub base_delay: Duration,
    /// Upper bound for computed delays
    pub max_delay: Duration,
    /// Relative jitter applied to computed delays (0.25 = ±25%)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(340),
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Un-jittered delay before retry number `retry` (0-based)
    pub fn nominal_delay(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Delay before retry number `retry`
    ///
    /// A retry hint is honored exactly. Otherwise the nominal delay is
    /// perturbed by the jitter fraction and capped at `max_delay`.
    pub fn backoff<R: Rng + ?Sized>(
        &self,
        retry: u32,
        hint: Option<Duration>,
        rng: &mut R,
    ) -> Duration {
        if let Some(hint) = hint {
            return hint;
        }

        let nominal = self.nominal_delay(retry);
        let factor = if self.jitter > 0.0 {
            rng.gen_range((1.0 - self.jitter)..=(1.0 + self.jitter))
        } else {
            1.0
        };
        nominal.mul_f64(factor).min(self.max_delay)
    }
}

/// Throttling, retrying executor for remote operations
pub struct RemoteClient {
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
    /// Start time of the most recent request
    last_call: Mutex<Option<Instant>>,
}

impl RemoteClient {
    /// Create a client on the system clock
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    /// Create a client on a specific clock
    pub fn with_clock(policy: RetryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            clock,
            last_call: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run one remote operation under spacing and retry rules
    ///
    /// `operation` is invoked once per attempt.
    pub async fn call<T, F, Fut>(&self, mut operation: F) -> RemoteResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RemoteResult<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.throttle().await;

            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_transient() {
                return Err(err);
            }
            if attempt >= max_attempts {
                warn!("Giving up after {} attempts: {}", attempt, err);
                return Err(RemoteError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self
                .policy
                .backoff(attempt - 1, err.retry_after(), &mut rand::thread_rng());
            warn!(
                "Transient failure (attempt {}/{}): {}; retrying in {:?}",
                attempt, max_attempts, err, delay
            );
            self.clock.sleep(delay).await;
        }
    }

    /// Wait until `min_interval` has passed since the previous request start
    ///
    /// The lock is held while waiting so concurrent callers queue up.
    async fn throttle(&self) {
        let mut last_call = self.last_call.lock().await;

        if let Some(previous) = *last_call {
            let elapsed = self.clock.now().saturating_duration_since(previous);
            if elapsed < self.policy.min_interval {
                let wait = self.policy.min_interval - elapsed;
                debug!("Throttling request for {:?}", wait);
                self.clock.sleep(wait).await;
            }
        }

        *last_call = Some(self.clock.now());
    }
}
