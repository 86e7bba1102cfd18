use async_trait::async_trait;
use eventease_shared::{BucketState, Seat, SeatId, SeatStatus};

use crate::StoreResult;

/// Result of a conditional seat write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasOutcome {
    /// The write was applied; carries the record as stored.
    Committed(Seat),
    /// The stored version no longer matched the expected one. Carries the
    /// current record, or `None` if the seat vanished.
    Stale(Option<Seat>),
}

/// Repository trait for seat records.
///
/// Exclusive-claim correctness lives entirely in `compare_and_swap`: an
/// implementation must apply `next` only if the stored version equals
/// `expected_version`, atomically with respect to every other writer.
#[async_trait]
pub trait SeatStore: Send + Sync {
    async fn get(&self, id: &SeatId) -> StoreResult<Option<Seat>>;

    async fn list(&self) -> StoreResult<Vec<Seat>>;

    async fn compare_and_swap(
        &self,
        id: &SeatId,
        expected_version: i64,
        next: &Seat,
    ) -> StoreResult<CasOutcome>;

    /// Inserts seats that do not exist yet and returns how many were added.
    /// Existing records are left untouched.
    async fn insert_all(&self, seats: &[Seat]) -> StoreResult<usize>;

    async fn count_by_status(&self, status: SeatStatus) -> StoreResult<u64> {
        let seats = self.list().await?;
        Ok(seats.iter().filter(|s| s.status == status).count() as u64)
    }

    async fn list_by_holder(&self, holder: &str) -> StoreResult<Vec<Seat>> {
        let seats = self.list().await?;
        Ok(seats
            .into_iter()
            .filter(|s| s.holder.as_deref() == Some(holder))
            .collect())
    }
}

/// Opaque per-key revision used for bucket compare-and-set.
pub type Revision = u64;

/// Repository trait for rate-limit buckets.
///
/// `compare_and_set` with `expected = None` must only succeed when the key
/// has no bucket yet; with `Some(rev)` only when the stored revision is
/// still `rev`. Successful writes bump the revision.
#[async_trait]
pub trait BucketStore: Send + Sync {
    async fn load(&self, key: &str) -> StoreResult<Option<(BucketState, Revision)>>;

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<Revision>,
        next: BucketState,
    ) -> StoreResult<bool>;
}
