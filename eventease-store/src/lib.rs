pub mod app_config;
pub mod database;
pub mod memory;
pub mod redis_repo;
pub mod seat_repo;

pub use database::DbClient;
pub use memory::{MemoryBucketStore, MemorySeatStore};
pub use redis_repo::RedisBucketStore;
pub use seat_repo::PgSeatStore;
