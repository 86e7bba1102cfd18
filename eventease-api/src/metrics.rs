//! Prometheus counters for claims, rate-limit denials and pool resets.

use axum::{extract::State, http::header, response::IntoResponse};
use eventease_booking::{BookingError, ReleaseReport, TickOutcome};
use eventease_shared::Seat;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::AppError;
use crate::state::AppState;

pub struct Metrics {
    registry: Registry,
    claims: IntCounterVec,
    rate_limit_denied: IntCounter,
    resets: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let claims = IntCounterVec::new(
            Opts::new("eventease_claims_total", "Seat claim attempts by outcome"),
            &["outcome"],
        )?;
        let rate_limit_denied = IntCounter::new(
            "eventease_rate_limit_denied_total",
            "Requests refused by the rate limiter",
        )?;
        let resets = IntCounterVec::new(
            Opts::new("eventease_resets_total", "Pool reset passes by outcome"),
            &["outcome"],
        )?;

        registry.register(Box::new(claims.clone()))?;
        registry.register(Box::new(rate_limit_denied.clone()))?;
        registry.register(Box::new(resets.clone()))?;

        Ok(Self {
            registry,
            claims,
            rate_limit_denied,
            resets,
        })
    }

    pub fn record_claim(&self, result: &Result<Seat, BookingError>) {
        let outcome = match result {
            Ok(_) => "claimed".to_string(),
            Err(e) => e.code().to_ascii_lowercase(),
        };
        self.claims.with_label_values(&[outcome.as_str()]).inc();
    }

    pub fn record_rate_limited(&self) {
        self.rate_limit_denied.inc();
    }

    pub fn record_reset(&self, result: &Result<ReleaseReport, BookingError>) {
        let outcome = match result {
            Ok(_) => "completed",
            Err(BookingError::ResetInProgress) => "skipped",
            Err(_) => "failed",
        };
        self.resets.with_label_values(&[outcome]).inc();
    }

    /// Scheduler observer hook.
    pub fn record_tick(&self, outcome: &TickOutcome) {
        let outcome = match outcome {
            TickOutcome::Released(_) => "completed",
            TickOutcome::Skipped => "skipped",
            TickOutcome::Failed(_) => "failed",
        };
        self.resets.with_label_values(&[outcome]).inc();
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state.metrics.render()?;
    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body))
}
