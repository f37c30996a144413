use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use busline_core::reservation::{CustomerContact, ReservationDetail, ReservationStatus};
use busline_shared::pii::Masked;

use crate::auth::{is_admin, require_admin};
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateReservationRequest {
    pub hold_id: Uuid,
    pub customer_name: String,
    pub customer_phone: Masked<String>,
    pub customer_email: Masked<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateReservationResponse {
    pub reservation_id: Uuid,
    pub total_price: f64,
    pub payment_deadline: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub reservation_id: Uuid,
    pub status: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/reservations", post(create_reservation))
        .route("/v1/reservations/{id}", get(get_reservation))
        .route("/v1/reservations/{id}/confirm", put(confirm_reservation))
        .route("/v1/reservations/{id}/cancel", put(cancel_reservation))
}

/// POST /v1/reservations
/// Convert a live hold into a pending reservation awaiting payment proof.
async fn create_reservation(
    State(state): State<AppState>,
    Json(req): Json<CreateReservationRequest>,
) -> Result<Json<CreateReservationResponse>, AppError> {
    let customer = CustomerContact {
        name: req.customer_name,
        phone: req.customer_phone,
        email: req.customer_email,
    };

    let reservation = state
        .reservation_manager
        .create_reservation(req.hold_id, customer)
        .await?;

    Ok(Json(CreateReservationResponse {
        reservation_id: reservation.id,
        total_price: reservation.total_price,
        payment_deadline: reservation.payment_deadline,
    }))
}

/// GET /v1/reservations/:id
/// Reservation joined with route/bus metadata and seat details.
async fn get_reservation(
    State(state): State<AppState>,
    Path(reservation_id): Path<Uuid>,
) -> Result<Json<ReservationDetail>, AppError> {
    let detail = state
        .reservation_manager
        .get_reservation(reservation_id)
        .await?;
    Ok(Json(detail))
}

/// PUT /v1/reservations/:id/confirm
/// Operator acknowledges out-of-band payment proof. Admin capability only.
async fn confirm_reservation(
    State(state): State<AppState>,
    Path(reservation_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<TransitionResponse>, AppError> {
    require_admin(&state, &headers)?;

    let reservation = state
        .reservation_manager
        .confirm_reservation(reservation_id)
        .await?;

    Ok(Json(TransitionResponse {
        reservation_id,
        status: reservation.status.as_str().to_string(),
    }))
}

/// PUT /v1/reservations/:id/cancel
/// Customers may cancel while pending; cancelling a confirmed reservation
/// takes the admin capability. The pre-read only picks the friendlier 403
/// for the common case; the manager re-checks the status inside the locked
/// transition.
async fn cancel_reservation(
    State(state): State<AppState>,
    Path(reservation_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<TransitionResponse>, AppError> {
    let admin = is_admin(&state, &headers);
    if !admin {
        let detail = state
            .reservation_manager
            .get_reservation(reservation_id)
            .await?;
        if detail.reservation.status == ReservationStatus::Confirmed {
            return Err(AppError::AuthorizationError(
                "cancelling a confirmed reservation requires the admin token".to_string(),
            ));
        }
    }

    let reservation = state
        .reservation_manager
        .cancel_reservation(reservation_id, admin)
        .await?;

    Ok(Json(TransitionResponse {
        reservation_id,
        status: reservation.status.as_str().to_string(),
    }))
}
