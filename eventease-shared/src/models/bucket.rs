use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token-bucket state for one caller key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BucketState {
    pub tokens: u32,
    /// Start of the refill interval currently in progress.
    pub last_refill: DateTime<Utc>,
}

impl BucketState {
    /// A bucket seen for the first time starts full.
    pub fn full(capacity: u32, now: DateTime<Utc>) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
        }
    }
}
