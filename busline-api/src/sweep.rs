use axum::{
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::Serialize;

use crate::auth::require_admin;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub expired_count: u64,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/sweep/holds", post(sweep_holds))
        .route("/v1/sweep/reservations", post(sweep_reservations))
}

/// POST /v1/sweep/holds
/// On-demand reclaim of expired holds; the background worker runs the same
/// operation on a timer.
async fn sweep_holds(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SweepResponse>, AppError> {
    require_admin(&state, &headers)?;
    let expired_count = state.sweeper.sweep_expired_holds().await?;
    Ok(Json(SweepResponse { expired_count }))
}

/// POST /v1/sweep/reservations
async fn sweep_reservations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SweepResponse>, AppError> {
    require_admin(&state, &headers)?;
    let expired_count = state.sweeper.sweep_expired_reservations().await?;
    Ok(Json(SweepResponse { expired_count }))
}
