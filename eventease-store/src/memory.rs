use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use eventease_core::{BucketStore, CasOutcome, Revision, SeatStore, StoreResult};
use eventease_shared::{BucketState, Seat, SeatId};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// In-process seat store for single-instance deployments and tests.
///
/// The write lock is only held for the compare and the replace, never across
/// caller I/O, so it stands in for a database row-level CAS.
#[derive(Debug, Default)]
pub struct MemorySeatStore {
    seats: RwLock<BTreeMap<SeatId, Seat>>,
}

impl MemorySeatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with the given records, as-is.
    pub fn with_seats(seats: impl IntoIterator<Item = Seat>) -> Self {
        Self {
            seats: RwLock::new(seats.into_iter().map(|s| (s.id.clone(), s)).collect()),
        }
    }
}

#[async_trait]
impl SeatStore for MemorySeatStore {
    async fn get(&self, id: &SeatId) -> StoreResult<Option<Seat>> {
        Ok(self.seats.read().await.get(id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<Seat>> {
        Ok(self.seats.read().await.values().cloned().collect())
    }

    async fn compare_and_swap(
        &self,
        id: &SeatId,
        expected_version: i64,
        next: &Seat,
    ) -> StoreResult<CasOutcome> {
        let mut seats = self.seats.write().await;
        match seats.get_mut(id) {
            Some(current) if current.version == expected_version => {
                *current = next.clone();
                Ok(CasOutcome::Committed(current.clone()))
            }
            Some(current) => Ok(CasOutcome::Stale(Some(current.clone()))),
            None => Ok(CasOutcome::Stale(None)),
        }
    }

    async fn insert_all(&self, seats: &[Seat]) -> StoreResult<usize> {
        let mut stored = self.seats.write().await;
        let mut inserted = 0;
        for seat in seats {
            if !stored.contains_key(&seat.id) {
                stored.insert(seat.id.clone(), seat.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

#[derive(Debug, Clone, Copy)]
struct BucketSlot {
    state: BucketState,
    revision: Revision,
    touched: Instant,
}

/// Sharded in-process bucket map. Each shard lock is held only for one
/// compare-and-set, so concurrent keys rarely contend.
///
/// With an idle TTL, a bucket not written for that long reads as absent, the
/// same way the Redis adapter lets keys expire. `purge_expired` drops such
/// buckets so per-client keys do not accumulate.
#[derive(Debug, Default)]
pub struct MemoryBucketStore {
    buckets: DashMap<String, BucketSlot>,
    idle_ttl: Option<Duration>,
    // Revisions never repeat for a key, even across expiry
    next_revision: AtomicU64,
}

impl MemoryBucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The TTL must cover the time an idle bucket needs to refill completely.
    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        Self {
            idle_ttl: Some(idle_ttl),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    fn is_expired(&self, slot: &BucketSlot, now: Instant) -> bool {
        self.idle_ttl
            .is_some_and(|ttl| now.saturating_duration_since(slot.touched) >= ttl)
    }

    /// Drop every bucket idle for longer than the TTL. Returns how many went.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.buckets.len();
        self.buckets.retain(|_, slot| !self.is_expired(slot, now));
        before.saturating_sub(self.buckets.len())
    }

    fn fresh_slot(&self, state: BucketState, now: Instant) -> BucketSlot {
        BucketSlot {
            state,
            revision: self.next_revision.fetch_add(1, Ordering::Relaxed) + 1,
            touched: now,
        }
    }
}

#[async_trait]
impl BucketStore for MemoryBucketStore {
    async fn load(&self, key: &str) -> StoreResult<Option<(BucketState, Revision)>> {
        let now = Instant::now();
        Ok(self
            .buckets
            .get(key)
            .filter(|slot| !self.is_expired(slot, now))
            .map(|slot| (slot.state, slot.revision)))
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<Revision>,
        next: BucketState,
    ) -> StoreResult<bool> {
        let now = Instant::now();
        match self.buckets.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let current = if self.is_expired(occupied.get(), now) {
                    None
                } else {
                    Some(occupied.get().revision)
                };
                if expected == current {
                    occupied.insert(self.fresh_slot(next, now));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                if expected.is_none() {
                    vacant.insert(self.fresh_slot(next, now));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }
}
