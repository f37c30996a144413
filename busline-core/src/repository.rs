use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use busline_catalog::ScheduleWithPricing;

use crate::availability::TripOccupancy;
use crate::error::BookingError;
use crate::hold::Hold;
use crate::reservation::{Reservation, ReservationDraft, ReservationStatus};

/// The durable source of truth for seat occupancy: holds plus reservations.
/// Each mutating method is one atomic unit of work — implementations must
/// perform the read-check-write sequence under a transaction or lock scoped
/// to the (schedule_id, trip_date) key, calling the pure checks in
/// `crate::availability` against live state.
#[async_trait]
pub trait AvailabilityLedger: Send + Sync {
    /// Atomically check the requested seats against live occupancy and
    /// insert a hold. Fails with `SeatCollision` without writing anything
    /// when any seat is taken or the bus is booked out.
    async fn create_hold(
        &self,
        schedule_id: Uuid,
        trip_date: NaiveDate,
        seat_ids: &[Uuid],
        expires_at: DateTime<Utc>,
    ) -> Result<Hold, BookingError>;

    async fn get_hold(&self, id: Uuid) -> Result<Option<Hold>, BookingError>;

    /// Idempotent delete: Ok whether or not the hold still exists.
    async fn release_hold(&self, id: Uuid) -> Result<(), BookingError>;

    /// Atomically convert a hold into a pending reservation: re-read the
    /// hold under lock (`HoldNotFound` / `HoldExpired`), defensively
    /// re-check its seats against pending/confirmed reservations
    /// (`SeatCollision`), insert the reservation, delete the hold.
    async fn convert_hold(
        &self,
        hold_id: Uuid,
        draft: ReservationDraft,
    ) -> Result<Reservation, BookingError>;

    async fn get_reservation(&self, id: Uuid) -> Result<Option<Reservation>, BookingError>;

    /// Guarded status change. Fails with `ReservationNotFound` for an
    /// unknown id and `InvalidTransition` when the current status does not
    /// admit `to`. When `allowed_from` is `Some`, the current status must
    /// additionally equal it, compared under the same lock as the write, so
    /// callers can make their authorization decision race-free. When `to`
    /// is `Confirmed`, `at` becomes `confirmed_at`.
    async fn transition_reservation(
        &self,
        id: Uuid,
        to: ReservationStatus,
        at: DateTime<Utc>,
        allowed_from: Option<ReservationStatus>,
    ) -> Result<Reservation, BookingError>;

    /// Occupancy snapshot for availability reads. `now` bounds which holds
    /// count as live.
    async fn trip_occupancy(
        &self,
        schedule_id: Uuid,
        trip_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<TripOccupancy, BookingError>;

    /// Bulk-delete holds with `expires_at <= now`; returns the count.
    async fn sweep_expired_holds(&self, now: DateTime<Utc>) -> Result<u64, BookingError>;

    /// Flip pending reservations with `payment_deadline < now` to expired;
    /// returns the count. Confirmed and cancelled rows are never touched.
    async fn sweep_expired_reservations(&self, now: DateTime<Utc>) -> Result<u64, BookingError>;
}

/// Read access to the trip catalog. The core treats this as immutable
/// reference data within a request.
#[async_trait]
pub trait ScheduleCatalog: Send + Sync {
    async fn schedule_with_pricing(
        &self,
        schedule_id: Uuid,
    ) -> Result<Option<ScheduleWithPricing>, BookingError>;
}
