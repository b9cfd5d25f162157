//! Retry policy with exponential backoff.

use std::time::Duration;
use vesper_config::RetrySettings;

/// Computes backoff delays for retryable failures.
///
/// `delay(attempt) = min(base × multiplier^attempt, max_delay)`. An
/// upstream `Retry-After` is honored verbatim in place of the computed
/// delay.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    settings: RetrySettings,
}

impl RetryPolicy {
    /// Create a policy from settings.
    #[must_use]
    pub fn new(settings: RetrySettings) -> Self {
        Self { settings }
    }

    /// Attempts allowed before the error surfaces.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.settings.max_retries
    }

    /// Backoff delay for the given zero-based attempt.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let seconds = self.settings.base_delay_seconds * self.settings.multiplier.powi(exponent);
        let capped = seconds.min(self.settings.max_delay_seconds);
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Delay for the attempt, honoring an upstream `Retry-After`
    /// verbatim when present.
    #[must_use]
    pub fn delay_with_override(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or_else(|| self.delay(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetrySettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(base: f64, multiplier: f64, max: f64, retries: u32) -> RetryPolicy {
        RetryPolicy::new(RetrySettings {
            max_retries: retries,
            base_delay_seconds: base,
            multiplier,
            max_delay_seconds: max,
        })
    }

    #[test]
    fn test_exponential_growth() {
        let policy = policy(1.0, 2.0, 60.0, 3);
        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(2), Duration::from_secs(4));
        assert_eq!(policy.delay(3), Duration::from_secs(8));
    }

    #[test]
    fn test_ceiling_applies() {
        let policy = policy(1.0, 2.0, 60.0, 10);
        assert_eq!(policy.delay(6), Duration::from_secs(60));
        assert_eq!(policy.delay(30), Duration::from_secs(60));
    }

    #[test]
    fn test_retry_after_honored_verbatim() {
        let policy = policy(1.0, 2.0, 60.0, 3);
        // Attempt 0 would back off 1s; the header says 2s and wins.
        assert_eq!(
            policy.delay_with_override(0, Some(Duration::from_secs(2))),
            Duration::from_secs(2)
        );
        assert_eq!(
            policy.delay_with_override(1, None),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_defaults_match_documentation() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries(), 3);
        assert_eq!(policy.delay(0), Duration::from_secs(1));
    }
}
