//! Retry policy for remote fetches.
//!
//! Attempts are bounded, the wait grows exponentially between a floor and a
//! cap, and only errors accepted by the policy's predicate are retried.

use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::provider::DataError;

/// Something that can wait. Tests inject a recorder instead of sleeping.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Records requested waits instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().map(|w| w.clone()).unwrap_or_default()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        if let Ok(mut waits) = self.waits.lock() {
            waits.push(duration);
        }
    }
}

/// Which failures earn another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryCondition {
    /// Only provider rate limiting ("Too Many Requests").
    RateLimit,
    /// Rate limiting and transient network failures.
    Transient,
}

impl RetryCondition {
    pub fn should_retry(self, error: &DataError) -> bool {
        match self {
            RetryCondition::RateLimit => error.is_rate_limit(),
            RetryCondition::Transient => {
                error.is_rate_limit() || matches!(error, DataError::NetworkUnreachable(_))
            }
        }
    }
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub multiplier: f64,
    /// Lower bound on every wait.
    pub min_delay: Duration,
    /// Upper bound on every wait.
    pub max_delay: Duration,
    pub retry_on: RetryCondition,
}

impl Default for RetryPolicy {
    /// 3 attempts, waits of `clamp(2^(n-1), 4s, 10s)`, rate limits only.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            multiplier: 1.0,
            min_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
            retry_on: RetryCondition::RateLimit,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = 2f64.powi(attempt.saturating_sub(1) as i32);
        let secs = (self.multiplier * exp).max(0.0);
        let raw = if secs.is_finite() {
            Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
        } else {
            self.max_delay
        };
        raw.clamp(self.min_delay, self.max_delay.max(self.min_delay))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. `op` receives the 1-based attempt number.
    pub fn run<T>(
        &self,
        sleeper: &dyn Sleeper,
        label: &str,
        mut op: impl FnMut(u32) -> Result<T, DataError>,
    ) -> Result<T, DataError> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(label, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if attempt < attempts && self.retry_on.should_retry(&e) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        label,
                        attempt,
                        delay_secs = delay.as_secs_f64(),
                        error = %e,
                        "retrying"
                    );
                    sleeper.sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate_limited() -> DataError {
        DataError::RateLimited("429".into())
    }

    #[test]
    fn delay_schedule_is_floored_and_capped() {
        let p = RetryPolicy::default();
        let secs: Vec<u64> = (1..=6).map(|a| p.delay_after(a).as_secs()).collect();
        assert_eq!(secs, vec![4, 4, 4, 8, 10, 10]);
    }

    #[test]
    fn retries_rate_limit_then_succeeds() {
        let sleeper = RecordingSleeper::default();
        let mut calls = 0;
        let out = RetryPolicy::default().run(&sleeper, "test", |_| {
            calls += 1;
            if calls < 3 {
                Err(rate_limited())
            } else {
                Ok(7)
            }
        });
        assert_eq!(out.unwrap(), 7);
        assert_eq!(calls, 3);
        assert_eq!(
            sleeper.waits(),
            vec![Duration::from_secs(4), Duration::from_secs(4)]
        );
    }

    #[test]
    fn gives_up_after_three_attempts() {
        let sleeper = RecordingSleeper::default();
        let mut calls = 0;
        let out: Result<(), _> = RetryPolicy::default().run(&sleeper, "test", |_| {
            calls += 1;
            Err(rate_limited())
        });
        assert!(out.unwrap_err().is_rate_limit());
        assert_eq!(calls, 3);
        assert_eq!(sleeper.waits().len(), 2);
    }

    #[test]
    fn other_errors_are_not_retried() {
        let sleeper = RecordingSleeper::default();
        let mut calls = 0;
        let out: Result<(), _> = RetryPolicy::default().run(&sleeper, "test", |_| {
            calls += 1;
            Err(DataError::NetworkUnreachable("down".into()))
        });
        assert!(matches!(out, Err(DataError::NetworkUnreachable(_))));
        assert_eq!(calls, 1);
        assert!(sleeper.waits().is_empty());
    }

    #[test]
    fn transient_condition_retries_network_errors() {
        let policy = RetryPolicy {
            retry_on: RetryCondition::Transient,
            ..RetryPolicy::default()
        };
        let sleeper = RecordingSleeper::default();
        let mut calls = 0;
        let out = policy.run(&sleeper, "test", |_| {
            calls += 1;
            if calls == 1 {
                Err(DataError::NetworkUnreachable("blip".into()))
            } else {
                Ok(())
            }
        });
        assert!(out.is_ok());
        assert_eq!(calls, 2);
    }
}
