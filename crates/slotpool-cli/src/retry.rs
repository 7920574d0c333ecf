//! Exponential backoff for retrying statements that hit a locked database

use std::thread;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Exponential backoff with optional jitter.
///
/// Attempt 0 waits `initial_ms`; each later attempt multiplies the delay
/// until it reaches `max_ms`.
#[derive(Debug, Clone)]
pub struct BackoffStrategy {
    initial_ms: u64,
    max_ms: u64,
    multiplier: f64,
    jitter: bool,
}

impl BackoffStrategy {
    pub fn new(initial_ms: u64, max_ms: u64) -> Self {
        Self {
            initial_ms: initial_ms.max(1),
            max_ms: max_ms.max(initial_ms),
            multiplier: 2.0,
            jitter: false,
        }
    }

    /// Spread delays by up to 25% either way so workers that collided once
    /// do not retry in lockstep
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before retry number `attempt` (zero-based)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let delay_ms = (self.initial_ms as f64) * self.multiplier.powi(exponent);
        let capped_ms = delay_ms.min(self.max_ms as f64) as u64;

        let final_ms = if self.jitter && capped_ms >= 4 {
            let spread = capped_ms / 4;
            rand::thread_rng().gen_range(capped_ms - spread..=capped_ms + spread)
        } else {
            capped_ms
        };

        Duration::from_millis(final_ms)
    }
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::new(10, 1_000)
    }
}

/// Retry settings as read from the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub initial_ms: u64,
    pub max_ms: u64,
    /// Attempts in total, including the first one
    pub max_attempts: u32,
}

impl RetryConfig {
    pub fn backoff(&self) -> BackoffStrategy {
        BackoffStrategy::new(self.initial_ms, self.max_ms).with_jitter(true)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_ms: 10,
            max_ms: 1_000,
            max_attempts: 20,
        }
    }
}

/// Run `op` until it succeeds, fails with an error `retryable` rejects, or
/// `max_attempts` is used up.
///
/// On success also returns how many retries were needed.
pub fn retry<T, E>(
    config: &RetryConfig,
    mut op: impl FnMut() -> Result<T, E>,
    retryable: impl Fn(&E) -> bool,
) -> Result<(T, u32), E> {
    let backoff = config.backoff();
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => return Ok((value, attempt)),
            Err(e) if retryable(&e) && attempt + 1 < config.max_attempts.max(1) => {
                let delay = backoff.calculate_delay(attempt);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after busy database");
                thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_and_caps() {
        let backoff = BackoffStrategy::new(100, 1_000);
        assert_eq!(backoff.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(backoff.calculate_delay(1), Duration::from_millis(200));
        assert_eq!(backoff.calculate_delay(3), Duration::from_millis(800));
        assert_eq!(backoff.calculate_delay(4), Duration::from_millis(1_000));
        assert_eq!(backoff.calculate_delay(u32::MAX), Duration::from_millis(1_000));
    }

    #[test]
    fn test_jitter_stays_within_a_quarter() {
        let backoff = BackoffStrategy::new(400, 400).with_jitter(true);
        for _ in 0..100 {
            let delay = backoff.calculate_delay(0).as_millis();
            assert!((300..=500).contains(&delay), "delay {delay} out of range");
        }
    }

    #[test]
    fn test_retry_until_success() {
        let config = RetryConfig {
            initial_ms: 1,
            max_ms: 2,
            max_attempts: 5,
        };
        let mut calls = 0;
        let result = retry(
            &config,
            || {
                calls += 1;
                if calls < 3 { Err("busy") } else { Ok(calls) }
            },
            |e| *e == "busy",
        );
        assert_eq!(result, Ok((3, 2)));
    }

    #[test]
    fn test_retry_gives_up_after_max_attempts() {
        let config = RetryConfig {
            initial_ms: 1,
            max_ms: 1,
            max_attempts: 3,
        };
        let mut calls = 0;
        let result: Result<((), u32), &str> = retry(
            &config,
            || {
                calls += 1;
                Err("busy")
            },
            |_| true,
        );
        assert_eq!(result, Err("busy"));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_retry_stops_on_fatal_error() {
        let mut calls = 0;
        let result: Result<((), u32), &str> = retry(
            &RetryConfig::default(),
            || {
                calls += 1;
                Err("syntax error")
            },
            |e| *e == "busy",
        );
        assert_eq!(result, Err("syntax error"));
        assert_eq!(calls, 1);
    }
}
