use std::time::Duration;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use eventease_booking::BookingError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    Booking(BookingError),
    RateLimited { retry_after: Duration },
    BadRequest(String),
    Anyhow(anyhow::Error),
}

/// Whole seconds, rounded up, never below one.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

fn booking_status(err: &BookingError) -> StatusCode {
    match err {
        BookingError::NotFound(_) => StatusCode::NOT_FOUND,
        BookingError::AlreadyClaimed(_) | BookingError::Conflict(_) | BookingError::ResetInProgress => {
            StatusCode::CONFLICT
        }
        BookingError::InvalidClaimant => StatusCode::BAD_REQUEST,
        BookingError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Booking(err) => {
                let status = booking_status(&err);
                if status.is_server_error() {
                    tracing::error!("Booking backend failure: {}", err);
                } else if matches!(err, BookingError::Conflict(_)) {
                    tracing::warn!("Concurrency conflict detected: {}", err);
                }
                (status, err.code(), err.to_string())
            }
            AppError::RateLimited { retry_after } => {
                let secs = retry_after_secs(retry_after);
                let body = Json(json!({
                    "error": "TOO_MANY_REQUESTS",
                    "message": "Rate limit exceeded. Please try again later.",
                    "retryAfterSeconds": secs,
                }));
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::RETRY_AFTER, secs.to_string())],
                    body,
                )
                    .into_response();
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": code,
            "message": message,
        }));

        (status, body).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        Self::Booking(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}

impl From<prometheus::Error> for AppError {
    fn from(err: prometheus::Error) -> Self {
        Self::Anyhow(anyhow::anyhow!("metrics encoding failed: {}", err))
    }
}
