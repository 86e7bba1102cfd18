use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use eventease_shared::{Seat, SeatId};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BookQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableCountResponse {
    pub available_seats: u64,
}

/// Routes that spend the caller's rate-limit tokens.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/book/{seat_id}", post(book_seat))
        .route("/api/booking/user/{user_id}", get(user_bookings))
        .route("/api/booking/available-count", get(available_count))
}

/// The seat map is polled continuously by clients, so it stays outside the
/// rate limiter and never eats into a caller's booking allowance.
pub fn unmetered_routes() -> Router<AppState> {
    Router::new().route("/api/seats", get(list_seats))
}

async fn list_seats(State(state): State<AppState>) -> Result<Json<Vec<Seat>>, AppError> {
    tracing::debug!("Seat map requested");
    Ok(Json(state.engine.list_seats().await?))
}

async fn book_seat(
    State(state): State<AppState>,
    Path(seat_id): Path<String>,
    Query(query): Query<BookQuery>,
) -> Result<Json<Seat>, AppError> {
    let user_id = query
        .user_id
        .ok_or_else(|| AppError::BadRequest("Required parameter 'userId' is missing".to_string()))?;

    let result = state.engine.claim_seat(&SeatId::new(seat_id), &user_id).await;
    state.metrics.record_claim(&result);
    Ok(Json(result?))
}

async fn user_bookings(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Seat>>, AppError> {
    tracing::debug!(user_id = %user_id, "Retrieving bookings for user");
    Ok(Json(state.engine.seats_by_holder(&user_id).await?))
}

async fn available_count(State(state): State<AppState>) -> Result<Json<AvailableCountResponse>, AppError> {
    let available_seats = state.engine.available_count().await?;
    Ok(Json(AvailableCountResponse { available_seats }))
}
