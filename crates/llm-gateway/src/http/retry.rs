//! Retry policy and backoff schedule for [`super::executor::execute`].

use std::time::Duration;

/// Controls how many times, and how long to wait between, retried attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub use_exponential_backoff: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(200),
            use_exponential_backoff: true,
        }
    }
}

impl RetryPolicy {
    /// The delay before the attempt numbered `attempt` (0-indexed, so
    /// `attempt=0` is the delay before the first retry).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if !self.use_exponential_backoff {
            return self.initial_delay;
        }

        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay.saturating_mul(factor)
    }

    /// Applies up to ±20% jitter to `delay` using `salt` as a deterministic
    /// source of entropy, so concurrent retries don't all wake at once.
    pub fn jittered(&self, delay: Duration, salt: u64) -> Duration {
        // A cheap, dependency-free jitter: fold the salt into a [0.8, 1.2)
        // multiplier without pulling in `rand` for something this small.
        let bucket = (salt % 41) as f64 / 100.0; // 0.00..=0.40
        let multiplier = 0.8 + bucket;
        delay.mul_f64(multiplier)
    }
}

/// Whether a response status warrants a retry.
pub fn should_retry_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(800));
    }

    #[test]
    fn fixed_backoff_ignores_attempt_number() {
        let policy = RetryPolicy {
            use_exponential_backoff: false,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for_attempt(0), policy.delay_for_attempt(5));
    }

    #[test]
    fn retryable_statuses_are_429_and_5xx_only() {
        assert!(should_retry_status(429));
        assert!(should_retry_status(500));
        assert!(should_retry_status(599));
        assert!(!should_retry_status(400));
        assert!(!should_retry_status(404));
        assert!(!should_retry_status(200));
    }

    #[test]
    fn jitter_stays_within_twenty_percent() {
        let policy = RetryPolicy::default();
        let base = Duration::from_millis(1000);
        for salt in 0..100 {
            let jittered = policy.jittered(base, salt);
            assert!(jittered >= Duration::from_millis(800));
            assert!(jittered < Duration::from_millis(1200));
        }
    }
}
