use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use busline_core::BookingError;

#[derive(Debug)]
pub enum AppError {
    Booking(BookingError),
    AuthorizationError(String),
    Internal(anyhow::Error),
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        AppError::Booking(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Booking(err) => match err {
                BookingError::Validation(_) | BookingError::ScheduleInactive(_) => {
                    (StatusCode::BAD_REQUEST, err.to_string())
                }
                // Distinguishable from generic failures so clients know to
                // reselect seats rather than blindly retry.
                BookingError::SeatCollision => (StatusCode::CONFLICT, err.to_string()),
                BookingError::InvalidTransition { .. } => (StatusCode::CONFLICT, err.to_string()),
                BookingError::HoldNotFound(_) | BookingError::ReservationNotFound(_) => {
                    (StatusCode::NOT_FOUND, err.to_string())
                }
                BookingError::HoldExpired(_) => (StatusCode::GONE, err.to_string()),
                BookingError::Storage(_) => {
                    tracing::error!("Storage failure: {:?}", err);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal Server Error".to_string(),
                    )
                }
            },
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Internal(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn status_of(err: BookingError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn booking_errors_map_to_expected_statuses() {
        let id = Uuid::new_v4();
        assert_eq!(
            status_of(BookingError::validation("bad")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(BookingError::SeatCollision), StatusCode::CONFLICT);
        assert_eq!(status_of(BookingError::HoldNotFound(id)), StatusCode::NOT_FOUND);
        assert_eq!(status_of(BookingError::HoldExpired(id)), StatusCode::GONE);
        assert_eq!(
            status_of(BookingError::ReservationNotFound(id)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(BookingError::ScheduleInactive(id)),
            StatusCode::BAD_REQUEST
        );
    }
}
