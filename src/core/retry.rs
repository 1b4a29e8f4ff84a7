//! Bounded retry loops.
//!
//! Bootstrap steps poll for things that may appear a moment after the
//! container starts (a mounted socket, a permission change). Every loop here
//! is bounded by an attempt count and sleeps between attempts.

use std::time::{Duration, Instant};

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total number of attempts, including the first (at least 1).
    pub max_attempts: u32,

    /// Delay before the second attempt.
    pub initial_delay: Duration,

    /// Maximum delay between attempts.
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each attempt (1.0 = fixed).
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::backoff(3, Duration::from_secs(1))
    }
}

impl RetryConfig {
    /// Single attempt, no retries.
    pub fn no_retry() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// Fixed delay between attempts.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, initial_delay: delay, max_delay: delay, backoff_multiplier: 1.0 }
    }

    /// Doubling delay between attempts, capped at 30 seconds.
    pub fn backoff(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32 - 1);
        let capped_delay = base_delay.min(self.max_delay.as_millis() as f64);

        Duration::from_millis(capped_delay as u64)
    }
}

/// Result of a retry operation.
#[derive(Debug)]
pub struct RetryResult<T, E> {
    /// The final result (success or last error).
    pub result: Result<T, E>,

    /// Number of attempts made.
    pub attempts: u32,

    /// Total time spent (including delays).
    pub total_time: Duration,
}

impl<T, E> RetryResult<T, E> {
    /// Check if the operation succeeded.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Whether more than one attempt was made.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Get the result.
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

/// Retry a synchronous operation with the given configuration.
///
/// The operation receives the 1-based attempt number.
pub fn retry<T, E, F>(config: &RetryConfig, mut operation: F) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Result<T, E>,
{
    let start = Instant::now();
    let max_attempts = config.max_attempts.max(1);
    let mut attempts = 0;

    loop {
        attempts += 1;
        let result = operation(attempts);

        if result.is_ok() || attempts >= max_attempts {
            return RetryResult { result, attempts, total_time: start.elapsed() };
        }

        let delay = config.delay_after_attempt(attempts);
        tracing::debug!("Attempt {}/{} failed, retrying in {:?}", attempts, max_attempts, delay);
        std::thread::sleep(delay);
    }
}
