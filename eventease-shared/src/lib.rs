pub mod models;

pub use models::{BucketState, Seat, SeatId, SeatStatus};
