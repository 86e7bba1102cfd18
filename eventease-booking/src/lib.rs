pub mod engine;
pub mod pool;
pub mod scheduler;

pub use engine::{BookingEngine, BookingError, ReleaseReport};
pub use pool::{seed_pool, PoolSeed};
pub use scheduler::{ResetScheduler, SchedulerHandle, TickOutcome};
