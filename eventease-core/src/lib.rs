pub mod clock;
pub mod repository;

pub use clock::{Clock, ManualClock, SystemClock};
pub use repository::{BucketStore, CasOutcome, Revision, SeatStore};

use std::time::Duration;

/// Failure reported by a seat or bucket store adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("Store backend error: {0}")]
    Backend(String),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        StoreError::Backend(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
