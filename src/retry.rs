//! Reusable retry policy with exponential backoff.
//!
//! Every external call in the application (page fetch, translation, image
//! download, transport delivery) retries through the same policy instead of
//! re-implementing its own loop. Callers supply a classifier that decides,
//! per error, whether another attempt is worth making.
//!
//! # Backoff Strategy
//!
//! The delay between retries follows this formula:
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
//! ```
//!
//! Rate-limited errors carry their own server-specified wait, which is
//! honored verbatim instead of the computed backoff.

use rand::{Rng, rng};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, warn};

/// How an error should be treated by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Timeouts, connection errors, 5xx: back off and try again.
    Transient,
    /// 4xx (except 429) and other permanent rejections: give up immediately.
    Terminal,
    /// 429 with a server-specified wait in seconds.
    RateLimited(u64),
}

/// Retry configuration shared by all external call sites.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: usize,
    /// Initial delay; doubles with each attempt.
    pub base_delay: Duration,
    /// Delay cap.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Self::default()
        }
    }

    /// Backoff delay before the attempt after `attempt` (1-based) failed.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(16) as u32;
        let mut delay = self.base_delay.saturating_mul(1u32 << shift);
        if delay > self.max_delay {
            delay = self.max_delay;
        }
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + Duration::from_millis(jitter_ms)
    }
}

/// Run `op` until it succeeds, the classifier declares the error terminal,
/// or attempts are exhausted.
///
/// Rate-limited waits sleep the server-specified duration; they still count
/// against `max_attempts` so a persistently throttling server cannot pin
/// the batch forever.
pub async fn with_retry<T, E, Fut, Op, Cl>(
    policy: &RetryPolicy,
    label: &str,
    classify: Cl,
    mut op: Op,
) -> Result<T, E>
where
    E: Display,
    Fut: Future<Output = Result<T, E>>,
    Op: FnMut() -> Fut,
    Cl: Fn(&E) -> RetryClass,
{
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                match classify(&e) {
                    RetryClass::Terminal => {
                        warn!(label, attempt, error = %e, "terminal error; not retrying");
                        return Err(e);
                    }
                    RetryClass::RateLimited(wait_secs) if attempt < policy.max_attempts => {
                        warn!(label, attempt, wait_secs, "rate limited; honoring server wait");
                        sleep(Duration::from_secs(wait_secs)).await;
                    }
                    RetryClass::Transient if attempt < policy.max_attempts => {
                        let delay = policy.delay_for(attempt);
                        warn!(
                            label,
                            attempt,
                            max = policy.max_attempts,
                            ?delay,
                            error = %e,
                            "attempt failed; backing off"
                        );
                        sleep(delay).await;
                    }
                    _ => {
                        error!(
                            label,
                            attempt,
                            max = policy.max_attempts,
                            error = %e,
                            "exhausted retries"
                        );
                        return Err(e);
                    }
                }
            }
        }
    }
}
