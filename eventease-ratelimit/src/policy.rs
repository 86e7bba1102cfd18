use std::time::Duration;

use chrono::{DateTime, Utc};
use eventease_shared::BucketState;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("Bucket capacity must be at least 1")]
    ZeroCapacity,
    #[error("Refill must add at least 1 token")]
    ZeroRefill,
    #[error("Refill interval must be at least 1ms")]
    ZeroInterval,
    #[error("At least one state update attempt is required")]
    ZeroAttempts,
}

/// Bucket shape and failure handling shared by every key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Maximum tokens a bucket holds. New buckets start full.
    pub capacity: u32,
    /// Tokens added at each interval boundary.
    pub refill_tokens: u32,
    pub refill_interval: Duration,
    /// Bound on optimistic update retries before failing closed.
    pub max_cas_attempts: u32,
    /// Retry hint handed out when the limiter denies because of a store fault.
    pub failure_backoff: Duration,
    pub store_timeout: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            capacity: 10,
            refill_tokens: 10,
            refill_interval: Duration::from_secs(60),
            max_cas_attempts: 8,
            failure_backoff: Duration::from_secs(1),
            store_timeout: Duration::from_millis(500),
        }
    }
}

impl RateLimitPolicy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.capacity == 0 {
            return Err(PolicyError::ZeroCapacity);
        }
        if self.refill_tokens == 0 {
            return Err(PolicyError::ZeroRefill);
        }
        if self.interval_ms() == 0 {
            return Err(PolicyError::ZeroInterval);
        }
        if self.max_cas_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        Ok(())
    }

    fn interval_ms(&self) -> i64 {
        i64::try_from(self.refill_interval.as_millis()).unwrap_or(i64::MAX)
    }

    /// Milliseconds since `last_refill`. A clock that moved backwards counts
    /// as no time passed.
    fn elapsed_ms(state: &BucketState, now: DateTime<Utc>) -> i64 {
        (now - state.last_refill).num_milliseconds().max(0)
    }

    /// Apply every whole interval that elapsed since the last refill.
    pub fn refill(&self, state: BucketState, now: DateTime<Utc>) -> BucketState {
        let interval_ms = self.interval_ms().max(1);
        let intervals = Self::elapsed_ms(&state, now) / interval_ms;

        let added = (intervals as u64).saturating_mul(u64::from(self.refill_tokens));
        let tokens = u64::from(state.tokens)
            .saturating_add(added)
            .min(u64::from(self.capacity)) as u32;

        let last_refill = if tokens >= self.capacity {
            now
        } else {
            state.last_refill + chrono::Duration::milliseconds(intervals * interval_ms)
        };

        BucketState { tokens, last_refill }
    }

    /// Time until the next interval boundary of an already refilled bucket.
    pub fn retry_after(&self, state: &BucketState, now: DateTime<Utc>) -> Duration {
        let interval_ms = self.interval_ms().max(1);
        let remaining = interval_ms - Self::elapsed_ms(state, now) % interval_ms;
        Duration::from_millis(remaining.max(1) as u64)
    }
}
