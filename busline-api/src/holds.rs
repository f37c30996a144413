use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateHoldRequest {
    pub schedule_id: Uuid,
    pub date: NaiveDate,
    pub seat_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CreateHoldResponse {
    pub hold_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/holds", post(create_hold))
        .route("/v1/holds/{id}", delete(release_hold))
}

/// POST /v1/holds
/// Claim seats for a trip instance while the customer fills in details.
async fn create_hold(
    State(state): State<AppState>,
    Json(req): Json<CreateHoldRequest>,
) -> Result<Json<CreateHoldResponse>, AppError> {
    let hold = state
        .hold_manager
        .create_hold(req.schedule_id, req.date, &req.seat_ids)
        .await?;

    Ok(Json(CreateHoldResponse {
        hold_id: hold.id,
        expires_at: hold.expires_at,
    }))
}

/// DELETE /v1/holds/:id
/// Idempotent: releasing an unknown or already-swept hold is still 204.
async fn release_hold(
    State(state): State<AppState>,
    Path(hold_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.hold_manager.release_hold(hold_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
