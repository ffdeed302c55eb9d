//! Class-aware retry backoff for dispatch attempts.

use crate::error_code::ErrorType;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Base delays per failure class. Each retry doubles the class base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryDelays {
    /// Timeouts and generic API errors.
    pub base_delay_ms: u64,
    pub rate_limit_base_delay_ms: u64,
    /// Validation and unclassified errors.
    pub other_error_base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryDelays {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            rate_limit_base_delay_ms: 5_000,
            other_error_base_delay_ms: 2_000,
            max_delay_ms: 60_000,
        }
    }
}

impl RetryDelays {
    fn class_base_ms(&self, error_type: ErrorType) -> u64 {
        match error_type {
            ErrorType::RateLimit => self.rate_limit_base_delay_ms,
            ErrorType::Timeout | ErrorType::ApiError => self.base_delay_ms,
            _ => self.other_error_base_delay_ms,
        }
    }

    /// Delay before retry number `retry_index` (0-based).
    ///
    /// A server-provided `retry_after` wins over the computed backoff; both are
    /// capped at `max_delay_ms`.
    pub fn delay_for(
        &self,
        error_type: ErrorType,
        retry_index: u32,
        retry_after: Option<Duration>,
    ) -> Duration {
        let cap = Duration::from_millis(self.max_delay_ms);
        if let Some(d) = retry_after {
            return d.min(cap);
        }
        // exponential backoff: base * 2^retry_index
        let factor = 1u64.checked_shl(retry_index).unwrap_or(u64::MAX);
        let delay = self.class_base_ms(error_type).saturating_mul(factor);
        Duration::from_millis(delay).min(cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_backs_off_longer() {
        let d = RetryDelays::default();
        assert_eq!(d.delay_for(ErrorType::ApiError, 0, None), Duration::from_secs(1));
        assert_eq!(d.delay_for(ErrorType::RateLimit, 0, None), Duration::from_secs(5));
        assert_eq!(
            d.delay_for(ErrorType::ValidationError, 0, None),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_exponential_growth_and_cap() {
        let d = RetryDelays::default();
        assert_eq!(d.delay_for(ErrorType::Timeout, 2, None), Duration::from_secs(4));
        assert_eq!(d.delay_for(ErrorType::RateLimit, 10, None), Duration::from_secs(60));
        assert_eq!(d.delay_for(ErrorType::Timeout, 200, None), Duration::from_secs(60));
    }

    #[test]
    fn test_retry_after_overrides() {
        let d = RetryDelays::default();
        assert_eq!(
            d.delay_for(ErrorType::RateLimit, 3, Some(Duration::from_millis(1500))),
            Duration::from_millis(1500)
        );
        assert_eq!(
            d.delay_for(ErrorType::RateLimit, 0, Some(Duration::from_secs(600))),
            Duration::from_secs(60)
        );
    }
}
