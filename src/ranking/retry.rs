//! Exponential backoff for transient reasoning-service failures

use super::client::ClientError;
use crate::{FlyTickerError, Result};
use rand::RngExt;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Retry policy shared by every reasoning-service call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    /// Extra factor applied to the delay after a rate-limit response
    pub rate_limit_factor: f64,
    pub max_delay_ms: u64,
    /// Relative jitter, 0.1 spreads delays by +/-10%
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            multiplier: 2.0,
            rate_limit_factor: 2.0,
            max_delay_ms: 30_000,
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Policy that never sleeps, for tests and dry runs
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter: 0.0,
            ..Self::default()
        }
    }

    /// Validate policy values
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a value cannot produce a sane schedule
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(FlyTickerError::config("retry.max_attempts must be at least 1"));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(FlyTickerError::config("retry.multiplier must be >= 1.0"));
        }
        if !self.rate_limit_factor.is_finite() || self.rate_limit_factor < 1.0 {
            return Err(FlyTickerError::config(
                "retry.rate_limit_factor must be >= 1.0",
            ));
        }
        if !(0.0..1.0).contains(&self.jitter) {
            return Err(FlyTickerError::config("retry.jitter must be in [0.0, 1.0)"));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(FlyTickerError::config(
                "retry.max_delay_ms must not be smaller than retry.base_delay_ms",
            ));
        }
        Ok(())
    }

    /// Un-jittered delay after the given zero-based failed attempt
    #[must_use]
    pub fn delay_for(&self, attempt: u32, rate_limited: bool) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let mut delay_ms = self.base_delay_ms as f64 * self.multiplier.powi(exponent);
        if rate_limited {
            delay_ms *= self.rate_limit_factor;
        }
        let capped = delay_ms.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 || delay.is_zero() {
            return delay;
        }
        let factor: f64 = rand::rng().random_range((1.0 - self.jitter)..(1.0 + self.jitter));
        delay.mul_f64(factor)
    }

    /// Run `operation` until it succeeds, fails permanently or attempts run out
    ///
    /// The closure receives the zero-based attempt number.
    ///
    /// # Errors
    ///
    /// Returns the first non-transient error, or the last transient one once
    /// every attempt has been spent
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> std::result::Result<T, ClientError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, ClientError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            debug!("{} attempt {}/{}", label, attempt + 1, max_attempts);

            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(
                            "{} succeeded after {} attempts in {:.3}s",
                            label,
                            attempt + 1,
                            started.elapsed().as_secs_f64()
                        );
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_transient() => {
                    error!("{} failed permanently: {}", label, err);
                    return Err(err);
                }
                Err(err) if attempt + 1 >= max_attempts => {
                    error!("{} failed after {} attempts: {}", label, max_attempts, err);
                    return Err(err);
                }
                Err(err) => {
                    let backoff = self.jittered(self.delay_for(attempt, err.is_rate_limited()));
                    warn!(
                        "{} attempt {} failed ({}), retrying in {:.1}s",
                        label,
                        attempt + 1,
                        err,
                        backoff.as_secs_f64()
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[rstest]
    #[case(0, false, 1000)]
    #[case(1, false, 2000)]
    #[case(2, false, 4000)]
    #[case(1, true, 4000)]
    #[case(10, false, 30_000)]
    fn test_delay_schedule(#[case] attempt: u32, #[case] rate_limited: bool, #[case] expected_ms: u64) {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay_for(attempt, rate_limited),
            Duration::from_millis(expected_ms)
        );
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let delay = policy.jittered(Duration::from_millis(1000));
            assert!(delay >= Duration::from_millis(900));
            assert!(delay <= Duration::from_millis(1100));
        }
    }

    #[rstest]
    #[case(RetryPolicy { max_attempts: 0, ..RetryPolicy::default() })]
    #[case(RetryPolicy { multiplier: 0.5, ..RetryPolicy::default() })]
    #[case(RetryPolicy { jitter: 1.5, ..RetryPolicy::default() })]
    #[case(RetryPolicy { rate_limit_factor: f64::NAN, ..RetryPolicy::default() })]
    #[case(RetryPolicy { max_delay_ms: 10, ..RetryPolicy::default() })]
    fn test_invalid_policies(#[case] policy: RetryPolicy) {
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_default_policy_is_valid() {
        assert!(RetryPolicy::default().validate().is_ok());
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = RetryPolicy::immediate(3)
            .run("test", move |_| async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ClientError::Status {
                        status: 503,
                        message: "unavailable".to_string(),
                    })
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_return_last_error() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: std::result::Result<(), _> = RetryPolicy::immediate(2)
            .run("test", move |_| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::Timeout("slow".to_string()))
            })
            .await;

        assert!(matches!(result, Err(ClientError::Timeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: std::result::Result<(), _> = RetryPolicy::immediate(5)
            .run("test", move |_| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::Status {
                    status: 401,
                    message: "bad key".to_string(),
                })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
