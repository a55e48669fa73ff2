//! Retry Policy
//!
//! Bounded retry with backoff for fallible async operations. The caller
//! decides which errors are worth another attempt; everything else is
//! returned on the spot.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Default number of attempts (first try included)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default backoff step in milliseconds
pub const DEFAULT_BACKOFF_MS: u64 = 1000;

/// Delay schedule between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `step * attempt`: 1s, 2s, 3s...
    Linear { step: Duration },
    /// `base * 2^(attempt - 1)`: 1s, 2s, 4s...
    Exponential { base: Duration },
}

impl Backoff {
    /// Delay to wait after the given (1-based) failed attempt
    pub fn delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match *self {
            Backoff::Linear { step } => step.saturating_mul(attempt),
            Backoff::Exponential { base } => {
                base.saturating_mul(2u32.saturating_pow(attempt - 1))
            }
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Linear {
            step: Duration::from_millis(DEFAULT_BACKOFF_MS),
        }
    }
}

/// How many times to try an operation and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included. Zero behaves like one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::default(),
        }
    }
}

/// The error that ended a retry loop, with the number of attempts made
#[derive(Debug)]
pub struct RetryFailure<E> {
    pub attempts: u32,
    pub error: E,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Linear policy: `max_attempts` tries, waiting `step * n` after failure `n`
    pub fn linear(max_attempts: u32, step: Duration) -> Self {
        Self::new(max_attempts, Backoff::Linear { step })
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent.
    ///
    /// `op` receives the 1-based attempt number. There is no sleep after the
    /// final attempt.
    pub async fn run<T, E, F, Fut, P>(&self, mut op: F, is_retryable: P) -> Result<T, RetryFailure<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if attempt >= max_attempts || !is_retryable(&error) {
                        return Err(RetryFailure {
                            attempts: attempt,
                            error,
                        });
                    }

                    let delay = self.backoff.delay(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
