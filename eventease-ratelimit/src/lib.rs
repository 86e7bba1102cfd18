//! Token-bucket admission control keyed by caller identity.

pub mod limiter;
pub mod policy;

pub use limiter::{Decision, RateLimiter};
pub use policy::{PolicyError, RateLimitPolicy};
