use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use eventease_core::{BucketStore, Clock, StoreError, StoreResult, SystemClock};
use eventease_shared::BucketState;
use tracing::{debug, error, warn};

use crate::policy::RateLimitPolicy;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// A token was consumed; `remaining` tokens are left in the bucket.
    Admitted { remaining: u32 },
    Denied { retry_after: Duration },
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted { .. })
    }
}

/// Per-key token bucket over a shared [`BucketStore`].
///
/// Updates are optimistic: read the bucket, refill it for elapsed time, take a
/// token and write it back only if nobody else wrote in between. Two callers
/// can never spend the same token. Store failures and exhausted retries deny
/// the request.
pub struct RateLimiter {
    store: Arc<dyn BucketStore>,
    clock: Arc<dyn Clock>,
    policy: RateLimitPolicy,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn BucketStore>, policy: RateLimitPolicy) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            policy,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    async fn bounded<T>(&self, op: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        match tokio::time::timeout(self.policy.store_timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.policy.store_timeout)),
        }
    }

    /// Consume one token from `key`'s bucket if one is available.
    pub async fn try_acquire(&self, key: &str) -> Decision {
        match self.acquire(key).await {
            Ok(Some(decision)) => {
                if let Decision::Denied { retry_after } = decision {
                    debug!(key, retry_after_ms = retry_after.as_millis() as u64, "Rate limit exceeded");
                }
                decision
            }
            Ok(None) => {
                warn!(
                    key,
                    attempts = self.policy.max_cas_attempts,
                    "Rate limit state too contended, denying request"
                );
                self.fail_closed()
            }
            Err(e) => {
                error!(key, error = %e, "Rate limit store unavailable, denying request");
                self.fail_closed()
            }
        }
    }

    fn fail_closed(&self) -> Decision {
        Decision::Denied {
            retry_after: self.policy.failure_backoff,
        }
    }

    /// `Ok(None)` means every update attempt lost its race.
    async fn acquire(&self, key: &str) -> StoreResult<Option<Decision>> {
        for attempt in 1..=self.policy.max_cas_attempts {
            let now = self.clock.now();
            let (state, expected) = match self.bounded(self.store.load(key)).await? {
                Some((state, revision)) => (self.policy.refill(state, now), Some(revision)),
                None => (BucketState::full(self.policy.capacity, now), None),
            };

            // Refill is recomputed on every read, so a denial writes nothing.
            if state.tokens == 0 {
                return Ok(Some(Decision::Denied {
                    retry_after: self.policy.retry_after(&state, now),
                }));
            }

            let next = BucketState {
                tokens: state.tokens - 1,
                ..state
            };
            if self.bounded(self.store.compare_and_set(key, expected, next)).await? {
                return Ok(Some(Decision::Admitted { remaining: next.tokens }));
            }
            debug!(key, attempt, "Lost bucket update race, retrying");
        }
        Ok(None)
    }
}
