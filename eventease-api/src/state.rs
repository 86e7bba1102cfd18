use std::sync::Arc;

use eventease_booking::BookingEngine;
use eventease_ratelimit::RateLimiter;

use crate::metrics::Metrics;
use crate::sale::SaleStatus;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<BookingEngine>,
    pub limiter: Arc<RateLimiter>,
    pub sale: Arc<SaleStatus>,
    pub metrics: Arc<Metrics>,
}
