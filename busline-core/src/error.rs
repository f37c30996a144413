use uuid::Uuid;

use crate::reservation::ReservationStatus;

/// Failure taxonomy for the booking core. Every in-transaction failure
/// rolls back before one of these surfaces; the ledger is never left with
/// a hold or reservation that violates the no-collision invariant.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("invalid request: {0}")]
    Validation(String),

    /// Requested seats (or the whole bus) conflict with an existing live
    /// hold or a pending/confirmed reservation. Retryable after reselecting.
    #[error("requested seats are no longer available")]
    SeatCollision,

    #[error("hold not found: {0}")]
    HoldNotFound(Uuid),

    #[error("hold expired: {0}")]
    HoldExpired(Uuid),

    #[error("reservation not found: {0}")]
    ReservationNotFound(Uuid),

    #[error("reservation {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: ReservationStatus,
        to: ReservationStatus,
    },

    #[error("schedule is not open for booking: {0}")]
    ScheduleInactive(Uuid),

    #[error("storage failure: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl BookingError {
    pub fn validation(msg: impl Into<String>) -> Self {
        BookingError::Validation(msg.into())
    }

    pub fn storage<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        BookingError::Storage(err.into())
    }

    /// Whether retrying the same request unchanged could succeed. Collisions
    /// and storage hiccups are transient; the rest need a different request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BookingError::SeatCollision | BookingError::Storage(_))
    }
}
