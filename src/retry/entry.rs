//! Delayed-retry record.

use crate::error_code::ErrorType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A persisted, exponentially backed-off retry schedule for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryQueueEntry {
    pub item_id: i64,
    pub reason: String,
    pub error_type: ErrorType,
    pub retry_count: u32,
    pub next_retry_at: DateTime<Utc>,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
    pub last_retry_at: Option<DateTime<Utc>>,
}

/// `now + delay`, saturating at the maximum representable time.
fn after(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// `base * 2^exponent`
fn backoff(base: Duration, exponent: u32) -> Duration {
    let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

impl RetryQueueEntry {
    /// First failure: scheduled one `base_delay` from `now`.
    pub fn new(
        item_id: i64,
        reason: impl Into<String>,
        error_type: ErrorType,
        max_retries: u32,
        base_delay: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            item_id,
            reason: reason.into(),
            error_type,
            retry_count: 0,
            next_retry_at: after(now, base_delay),
            max_retries,
            created_at: now,
            last_retry_at: None,
        }
    }

    pub fn should_retry_at(&self, now: DateTime<Utc>) -> bool {
        self.retry_count < self.max_retries && now > self.next_retry_at
    }

    pub fn should_retry(&self) -> bool {
        self.should_retry_at(Utc::now())
    }

    pub fn is_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }

    /// The record after another failed attempt at `now`.
    pub fn incremented_at(&self, base_delay: Duration, now: DateTime<Utc>) -> Self {
        let retry_count = self.retry_count.saturating_add(1);
        Self {
            retry_count,
            next_retry_at: after(now, backoff(base_delay, retry_count)),
            last_retry_at: Some(now),
            ..self.clone()
        }
    }

    pub fn increment_retry(&self, base_delay: Duration) -> Self {
        self.incremented_at(base_delay, Utc::now())
    }

    /// Replace the stored reason with the latest failure.
    pub fn with_failure(mut self, reason: impl Into<String>, error_type: ErrorType) -> Self {
        self.reason = reason.into();
        self.error_type = error_type;
        self
    }
}
