#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use eventease_core::{CasOutcome, SeatStore, StoreError, StoreResult};
use eventease_shared::{Seat, SeatId};
use eventease_store::MemorySeatStore;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Barrier, Notify};

pub fn available(ids: &[&str]) -> Vec<Seat> {
    let now = Utc::now();
    ids.iter().map(|id| Seat::new(SeatId::new(*id), now)).collect()
}

pub fn memory_pool(ids: &[&str]) -> Arc<MemorySeatStore> {
    Arc::new(MemorySeatStore::with_seats(available(ids)))
}

/// Every `get` waits until `parties` readers have read, so they all act on
/// the same version.
pub struct GatedStore {
    pub inner: Arc<MemorySeatStore>,
    barrier: Barrier,
}

impl GatedStore {
    pub fn new(inner: Arc<MemorySeatStore>, parties: usize) -> Self {
        Self {
            inner,
            barrier: Barrier::new(parties),
        }
    }
}

#[async_trait]
impl SeatStore for GatedStore {
    async fn get(&self, id: &SeatId) -> StoreResult<Option<Seat>> {
        let seat = self.inner.get(id).await?;
        self.barrier.wait().await;
        Ok(seat)
    }

    async fn list(&self) -> StoreResult<Vec<Seat>> {
        self.inner.list().await
    }

    async fn compare_and_swap(&self, id: &SeatId, expected: i64, next: &Seat) -> StoreResult<CasOutcome> {
        self.inner.compare_and_swap(id, expected, next).await
    }

    async fn insert_all(&self, seats: &[Seat]) -> StoreResult<usize> {
        self.inner.insert_all(seats).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseOn {
    Get,
    List,
}

/// The first read of the chosen kind parks after reading until `resume` is
/// called. Later reads go straight through.
pub struct PausingStore {
    pub inner: Arc<MemorySeatStore>,
    pause_on: PauseOn,
    armed: AtomicBool,
    reached: Notify,
    proceed: Notify,
}

impl PausingStore {
    pub fn new(inner: Arc<MemorySeatStore>, pause_on: PauseOn) -> Self {
        Self {
            inner,
            pause_on,
            armed: AtomicBool::new(true),
            reached: Notify::new(),
            proceed: Notify::new(),
        }
    }

    /// Resolves once the paused read has happened.
    pub async fn paused(&self) {
        self.reached.notified().await;
    }

    pub fn resume(&self) {
        self.proceed.notify_one();
    }

    async fn maybe_pause(&self, kind: PauseOn) {
        if kind == self.pause_on && self.armed.swap(false, Ordering::SeqCst) {
            self.reached.notify_one();
            self.proceed.notified().await;
        }
    }
}

#[async_trait]
impl SeatStore for PausingStore {
    async fn get(&self, id: &SeatId) -> StoreResult<Option<Seat>> {
        let seat = self.inner.get(id).await?;
        self.maybe_pause(PauseOn::Get).await;
        Ok(seat)
    }

    async fn list(&self) -> StoreResult<Vec<Seat>> {
        let seats = self.inner.list().await?;
        self.maybe_pause(PauseOn::List).await;
        Ok(seats)
    }

    async fn compare_and_swap(&self, id: &SeatId, expected: i64, next: &Seat) -> StoreResult<CasOutcome> {
        self.inner.compare_and_swap(id, expected, next).await
    }

    async fn insert_all(&self, seats: &[Seat]) -> StoreResult<usize> {
        self.inner.insert_all(seats).await
    }
}

/// Commits a claim behind the reader's back right after the next `list`,
/// as if a claimant won the seat between the reset's read and its write.
pub struct InterleavingStore {
    pub inner: Arc<MemorySeatStore>,
    inject: Mutex<Option<(SeatId, String)>>,
}

impl InterleavingStore {
    pub fn new(inner: Arc<MemorySeatStore>, seat: &str, claimant: &str) -> Self {
        Self {
            inner,
            inject: Mutex::new(Some((SeatId::new(seat), claimant.to_string()))),
        }
    }
}

#[async_trait]
impl SeatStore for InterleavingStore {
    async fn get(&self, id: &SeatId) -> StoreResult<Option<Seat>> {
        self.inner.get(id).await
    }

    async fn list(&self) -> StoreResult<Vec<Seat>> {
        let snapshot = self.inner.list().await?;
        let pending = self.inject.lock().unwrap().take();
        if let Some((id, claimant)) = pending {
            let current = self.inner.get(&id).await?.expect("seat exists");
            let next = current.claimed_by(&claimant, Utc::now());
            let outcome = self.inner.compare_and_swap(&id, current.version, &next).await?;
            assert!(matches!(outcome, CasOutcome::Committed(_)));
        }
        Ok(snapshot)
    }

    async fn compare_and_swap(&self, id: &SeatId, expected: i64, next: &Seat) -> StoreResult<CasOutcome> {
        self.inner.compare_and_swap(id, expected, next).await
    }

    async fn insert_all(&self, seats: &[Seat]) -> StoreResult<usize> {
        self.inner.insert_all(seats).await
    }
}

/// `list` fails while failures remain, then behaves normally.
pub struct FlakyStore {
    pub inner: Arc<MemorySeatStore>,
    failures_left: AtomicUsize,
    list_calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemorySeatStore>, failures: usize) -> Self {
        Self {
            inner,
            failures_left: AtomicUsize::new(failures),
            list_calls: AtomicUsize::new(0),
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SeatStore for FlakyStore {
    async fn get(&self, id: &SeatId) -> StoreResult<Option<Seat>> {
        self.inner.get(id).await
    }

    async fn list(&self) -> StoreResult<Vec<Seat>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Backend("connection refused".to_string()));
        }
        self.inner.list().await
    }

    async fn compare_and_swap(&self, id: &SeatId, expected: i64, next: &Seat) -> StoreResult<CasOutcome> {
        self.inner.compare_and_swap(id, expected, next).await
    }

    async fn insert_all(&self, seats: &[Seat]) -> StoreResult<usize> {
        self.inner.insert_all(seats).await
    }
}

/// Never answers.
pub struct StallingStore;

#[async_trait]
impl SeatStore for StallingStore {
    async fn get(&self, _id: &SeatId) -> StoreResult<Option<Seat>> {
        std::future::pending().await
    }

    async fn list(&self) -> StoreResult<Vec<Seat>> {
        std::future::pending().await
    }

    async fn compare_and_swap(&self, _id: &SeatId, _expected: i64, _next: &Seat) -> StoreResult<CasOutcome> {
        std::future::pending().await
    }

    async fn insert_all(&self, _seats: &[Seat]) -> StoreResult<usize> {
        std::future::pending().await
    }
}
