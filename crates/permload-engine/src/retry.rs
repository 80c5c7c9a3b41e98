//! Exponential backoff with per-operation error classification.

use std::future::Future;
use std::time::{Duration, Instant};

use permload_core::{ApiError, Error, ErrorClass, Result, RetryConfig};
use rand::Rng;

/// Backoff schedule and retry budget.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub multiplier: f64,
    /// Each delay is drawn from `[d * (1 - f), d * (1 + f)]`.
    pub randomization_factor: f64,
    pub max_interval: Duration,
    /// Stop once waiting again would exceed this much total time.
    pub max_elapsed: Option<Duration>,
    /// Total attempts, including the first.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            initial_interval: Duration::from_millis(config.initial_interval_ms),
            multiplier: config.multiplier,
            randomization_factor: config.randomization_factor,
            max_interval: Duration::from_millis(config.max_interval_ms),
            max_elapsed: config.max_elapsed_secs.map(Duration::from_secs),
            max_attempts: config.max_attempts,
        }
    }

    /// Constant, jitter-free delay. Mostly useful in tests.
    pub fn fixed(delay: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            initial_interval: delay,
            multiplier: 1.0,
            randomization_factor: 0.0,
            max_interval: delay,
            max_elapsed: None,
            max_attempts,
        }
    }

    fn backoff(&self) -> ExponentialBackoff<'_> {
        ExponentialBackoff {
            policy: self,
            current: self.initial_interval,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

struct ExponentialBackoff<'a> {
    policy: &'a RetryPolicy,
    current: Duration,
}

impl ExponentialBackoff<'_> {
    fn next_delay(&mut self) -> Duration {
        let current = self.current;
        let max_interval = self.policy.max_interval;
        let factor = self.policy.randomization_factor;
        let delay = if factor > 0.0 {
            let base = current.as_secs_f64();
            let delta = base * factor;
            let jittered = rand::thread_rng().gen_range((base - delta)..=(base + delta));
            Duration::try_from_secs_f64(jittered.max(0.0)).unwrap_or(current)
        } else {
            current
        };

        // Grow in floating point so huge multipliers saturate at the cap.
        let grown = current.as_secs_f64() * self.policy.multiplier;
        self.current = Duration::try_from_secs_f64(grown)
            .map_or(max_interval, |next| next.min(max_interval));
        delay
    }
}

/// How a retried call ended without error.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome<T> {
    /// The call succeeded.
    Done(T),
    /// The platform reported the resource as already existing.
    Conflict(ApiError),
}

/// Run `op` until it succeeds, conflicts, fails fatally, or the budget is spent.
///
/// `notify` is called once per scheduled retry with the error that caused it
/// and the delay about to be slept.
pub async fn retry_notify<T, F, Fut, C, N>(
    policy: &RetryPolicy,
    operation: &'static str,
    classify: C,
    mut op: F,
    mut notify: N,
) -> Result<RetryOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, ApiError>>,
    C: Fn(&ApiError) -> ErrorClass,
    N: FnMut(&ApiError, Duration),
{
    let started = Instant::now();
    let mut backoff = policy.backoff();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let err = match op().await {
            Ok(value) => return Ok(RetryOutcome::Done(value)),
            Err(err) => err,
        };

        match classify(&err) {
            ErrorClass::Conflict => return Ok(RetryOutcome::Conflict(err)),
            ErrorClass::Fatal => return Err(Error::Api(err)),
            ErrorClass::Transient => {}
        }

        if policy.max_attempts.is_some_and(|max| attempts >= max) {
            return Err(Error::RetriesExhausted {
                operation,
                attempts,
                last: err,
            });
        }

        let delay = backoff.next_delay();
        if let Some(max_elapsed) = policy.max_elapsed {
            if started.elapsed().saturating_add(delay) > max_elapsed {
                return Err(Error::RetriesExhausted {
                    operation,
                    attempts,
                    last: err,
                });
            }
        }

        notify(&err, delay);
        tokio::time::sleep(delay).await;
    }
}
