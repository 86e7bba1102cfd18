pub mod bucket;
pub mod seat;

pub use bucket::BucketState;
pub use seat::{Seat, SeatId, SeatStatus};
