use eventease_core::{CasOutcome, Clock, SeatStore, StoreError, StoreResult, SystemClock};
use eventease_shared::{Seat, SeatId, SeatStatus};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// Seat allocation over an optimistic-concurrency seat store.
///
/// The engine keeps no lock table. Exclusivity is decided by the store's
/// compare-and-swap, and a lost race is reported as `Conflict` rather than
/// retried, so at most one claimant wins each seat per cycle.
pub struct BookingEngine {
    store: Arc<dyn SeatStore>,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
    reset_in_flight: AtomicBool,
}

/// Outcome of one `release_all` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReleaseReport {
    /// Seats moved from SOLD back to AVAILABLE.
    pub released: usize,
    /// Seats that were already AVAILABLE and had their version advanced.
    pub refreshed: usize,
    /// Seats whose release lost to a concurrent write. They keep whatever
    /// that write committed and are picked up by the next pass.
    pub contended: Vec<SeatId>,
}

impl ReleaseReport {
    pub fn total(&self) -> usize {
        self.released + self.refreshed + self.contended.len()
    }
}

impl BookingEngine {
    pub fn new(store: Arc<dyn SeatStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            reset_in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Bounds a store call by the configured timeout.
    async fn bounded<T>(&self, op: impl Future<Output = StoreResult<T>>) -> Result<T, BookingError> {
        match tokio::time::timeout(self.store_timeout, op).await {
            Ok(result) => result.map_err(BookingError::from),
            Err(_) => Err(StoreError::Timeout(self.store_timeout).into()),
        }
    }

    /// Claim an AVAILABLE seat for `claimant_id`.
    pub async fn claim_seat(&self, seat_id: &SeatId, claimant_id: &str) -> Result<Seat, BookingError> {
        if claimant_id.trim().is_empty() {
            return Err(BookingError::InvalidClaimant);
        }

        let current = self
            .bounded(self.store.get(seat_id))
            .await?
            .ok_or_else(|| BookingError::NotFound(seat_id.clone()))?;

        if !current.is_available() {
            debug!(seat_id = %seat_id, claimant = claimant_id, "Seat already sold");
            return Err(BookingError::AlreadyClaimed(seat_id.clone()));
        }

        let next = current.claimed_by(claimant_id, self.clock.now());
        match self
            .bounded(self.store.compare_and_swap(seat_id, current.version, &next))
            .await?
        {
            CasOutcome::Committed(seat) => {
                info!(seat_id = %seat_id, claimant = claimant_id, version = seat.version, "Seat claimed");
                Ok(seat)
            }
            CasOutcome::Stale(Some(_)) => {
                warn!(
                    seat_id = %seat_id,
                    claimant = claimant_id,
                    read_version = current.version,
                    "Concurrency conflict while claiming seat"
                );
                Err(BookingError::Conflict(seat_id.clone()))
            }
            CasOutcome::Stale(None) => Err(BookingError::NotFound(seat_id.clone())),
        }
    }

    /// Snapshot of the whole pool in seat order.
    pub async fn list_seats(&self) -> Result<Vec<Seat>, BookingError> {
        self.bounded(self.store.list()).await
    }

    pub async fn available_count(&self) -> Result<u64, BookingError> {
        self.bounded(self.store.count_by_status(SeatStatus::Available)).await
    }

    /// Seats currently sold to `holder`.
    pub async fn seats_by_holder(&self, holder: &str) -> Result<Vec<Seat>, BookingError> {
        self.bounded(self.store.list_by_holder(holder)).await
    }

    /// Return every seat to AVAILABLE, one conditional write per seat.
    ///
    /// A seat whose release loses to a concurrent claim stays SOLD and is
    /// listed in `contended`. Only one pass runs at a time; a concurrent call
    /// gets `ResetInProgress`. A store failure aborts the pass, leaving seats
    /// released so far released.
    pub async fn release_all(&self) -> Result<ReleaseReport, BookingError> {
        let _guard = ResetGuard::acquire(&self.reset_in_flight).ok_or(BookingError::ResetInProgress)?;

        let seats = self.bounded(self.store.list()).await?;
        let mut report = ReleaseReport::default();

        for seat in seats {
            let next = seat.released(self.clock.now());
            match self
                .bounded(self.store.compare_and_swap(&seat.id, seat.version, &next))
                .await?
            {
                CasOutcome::Committed(_) if seat.is_available() => report.refreshed += 1,
                CasOutcome::Committed(_) => report.released += 1,
                CasOutcome::Stale(_) => {
                    debug!(seat_id = %seat.id, read_version = seat.version, "Release lost to a concurrent write");
                    report.contended.push(seat.id);
                }
            }
        }

        info!(
            released = report.released,
            refreshed = report.refreshed,
            contended = report.contended.len(),
            "FLASHSALE_RESET: {} seats released",
            report.released + report.refreshed
        );
        Ok(report)
    }
}

/// Single-flight token for `release_all`.
struct ResetGuard<'a>(&'a AtomicBool);

impl<'a> ResetGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ResetGuard(flag))
    }
}

impl Drop for ResetGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingError {
    #[error("Seat not found: {0}")]
    NotFound(SeatId),

    #[error("Seat {0} is not available")]
    AlreadyClaimed(SeatId),

    #[error("Seat {0} was modified by another transaction. Please try again.")]
    Conflict(SeatId),

    #[error("Claimant identity must not be empty")]
    InvalidClaimant,

    #[error("A seat reset is already in progress")]
    ResetInProgress,

    #[error("Seat store unavailable: {0}")]
    Unavailable(String),
}

impl BookingError {
    /// Stable machine-readable tag, used in API bodies and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::NotFound(_) => "SEAT_NOT_FOUND",
            BookingError::AlreadyClaimed(_) => "SEAT_ALREADY_CLAIMED",
            BookingError::Conflict(_) => "CONCURRENT_MODIFICATION",
            BookingError::InvalidClaimant => "INVALID_CLAIMANT",
            BookingError::ResetInProgress => "RESET_IN_PROGRESS",
            BookingError::Unavailable(_) => "STORE_UNAVAILABLE",
        }
    }

    /// Whether the caller may retry the same request later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BookingError::Conflict(_) | BookingError::ResetInProgress | BookingError::Unavailable(_)
        )
    }
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        BookingError::Unavailable(err.to_string())
    }
}
