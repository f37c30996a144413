use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use busline_core::TripAvailability;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
}

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/v1/schedules/{id}/availability",
        get(schedule_availability),
    )
}

/// GET /v1/schedules/:id/availability?date=YYYY-MM-DD
/// Seat map for one trip instance. May lag mutations slightly; the ledger
/// re-checks at write time, so this is display data, not a promise.
async fn schedule_availability(
    State(state): State<AppState>,
    Path(schedule_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<TripAvailability>, AppError> {
    let availability = state
        .hold_manager
        .availability(schedule_id, query.date)
        .await?;
    Ok(Json(availability))
}
