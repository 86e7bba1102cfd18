use chrono::{DateTime, Utc};
use eventease_core::{SeatStore, StoreResult};
use eventease_shared::{Seat, SeatId};
use tracing::info;

/// What `seed_pool` found and did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSeed {
    pub existing: usize,
    pub inserted: usize,
}

/// Create the fixed seat pool `<prefix>1..=<prefix><pool_size>` if the store
/// is empty. A store that already holds seats is left exactly as it is.
pub async fn seed_pool(
    store: &dyn SeatStore,
    prefix: &str,
    pool_size: u32,
    now: DateTime<Utc>,
) -> StoreResult<PoolSeed> {
    let existing = store.list().await?.len();
    if existing > 0 {
        info!(existing, "Seat pool already initialized");
        return Ok(PoolSeed { existing, inserted: 0 });
    }

    let seats: Vec<Seat> = (1..=pool_size)
        .map(|n| Seat::new(SeatId::sequential(prefix, n), now))
        .collect();
    let inserted = store.insert_all(&seats).await?;

    info!(inserted, prefix, "SEEDED seat pool");
    Ok(PoolSeed { existing, inserted })
}
