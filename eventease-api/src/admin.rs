use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use eventease_booking::ReleaseReport;
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetResponse {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub report: ReleaseReport,
    pub available_seats: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleToggleResponse {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub enabled: bool,
    pub available_seats: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub flash_sale_enabled: bool,
    pub available_seats: u64,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Handlers
// ============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/reset", post(reset_seats))
        .route("/api/admin/start", post(start_sale))
        .route("/api/admin/stop", post(stop_sale))
        .route("/api/admin/status", get(status))
}

async fn reset_seats(State(state): State<AppState>) -> Result<Json<ResetResponse>, AppError> {
    tracing::info!("Manual reset triggered by admin");
    let result = state.engine.release_all().await;
    state.metrics.record_reset(&result);
    let report = result?;

    Ok(Json(ResetResponse {
        message: "All seats have been reset to AVAILABLE".to_string(),
        timestamp: Utc::now(),
        report,
        available_seats: state.engine.available_count().await?,
    }))
}

async fn toggle_sale(state: &AppState, enabled: bool) -> Result<SaleToggleResponse, AppError> {
    let was_enabled = state.sale.set(enabled);
    if was_enabled != enabled {
        tracing::info!(enabled, "Flash sale flag changed by admin");
    }

    let message = if enabled {
        "Flash sale has been started"
    } else {
        "Flash sale has been stopped"
    };
    Ok(SaleToggleResponse {
        message: message.to_string(),
        timestamp: Utc::now(),
        enabled,
        available_seats: state.engine.available_count().await?,
    })
}

async fn start_sale(State(state): State<AppState>) -> Result<Json<SaleToggleResponse>, AppError> {
    Ok(Json(toggle_sale(&state, true).await?))
}

async fn stop_sale(State(state): State<AppState>) -> Result<Json<SaleToggleResponse>, AppError> {
    Ok(Json(toggle_sale(&state, false).await?))
}

async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, AppError> {
    Ok(Json(StatusResponse {
        flash_sale_enabled: state.sale.is_enabled(),
        available_seats: state.engine.available_count().await?,
        timestamp: Utc::now(),
    }))
}
