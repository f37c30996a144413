use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use busline_catalog::ScheduleWithPricing;
use busline_core::availability::{self, TripOccupancy};
use busline_core::reservation::{Reservation, ReservationDraft, ReservationKind, ReservationStatus};
use busline_core::{AvailabilityLedger, BookingError, Hold, ScheduleCatalog};

/// In-memory ledger for tests and local development. A single mutex makes
/// each operation atomic, standing in for the Postgres transaction plus
/// advisory lock; the collision checks are the same pure functions the
/// Postgres ledger runs.
#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    holds: HashMap<Uuid, Hold>,
    reservations: HashMap<Uuid, Reservation>,
}

impl LedgerState {
    fn occupancy(
        &self,
        schedule_id: Uuid,
        trip_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> TripOccupancy {
        let mut occupancy = TripOccupancy::default();

        for r in self.reservations.values() {
            if r.schedule_id != schedule_id || r.trip_date != trip_date {
                continue;
            }
            if !matches!(
                r.status,
                ReservationStatus::Pending | ReservationStatus::Confirmed
            ) {
                continue;
            }
            if r.kind == ReservationKind::FullBus {
                occupancy.full_bus_reserved = true;
            }
            occupancy.reserved.extend(r.seat_ids.iter().copied());
        }

        for h in self.holds.values() {
            if h.schedule_id == schedule_id && h.trip_date == trip_date && !h.is_expired(now) {
                occupancy.held.extend(h.seat_ids.iter().copied());
            }
        }

        occupancy
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plant a hold directly, bypassing the collision check. Test seam for
    /// expiry scenarios that need a hold with a timestamp in the past.
    pub async fn put_hold(&self, hold: Hold) {
        self.state.lock().await.holds.insert(hold.id, hold);
    }

    /// Plant a reservation directly. Test seam for sweep and transition
    /// scenarios.
    pub async fn put_reservation(&self, reservation: Reservation) {
        self.state
            .lock()
            .await
            .reservations
            .insert(reservation.id, reservation);
    }

    pub async fn hold_count(&self) -> usize {
        self.state.lock().await.holds.len()
    }
}

#[async_trait]
impl AvailabilityLedger for MemoryLedger {
    async fn create_hold(
        &self,
        schedule_id: Uuid,
        trip_date: NaiveDate,
        seat_ids: &[Uuid],
        expires_at: DateTime<Utc>,
    ) -> Result<Hold, BookingError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();

        let occupancy = state.occupancy(schedule_id, trip_date, now);
        availability::check_seats_free(seat_ids, &occupancy)?;

        let hold = Hold {
            id: Uuid::new_v4(),
            schedule_id,
            trip_date,
            seat_ids: seat_ids.to_vec(),
            created_at: now,
            expires_at,
        };
        state.holds.insert(hold.id, hold.clone());
        Ok(hold)
    }

    async fn get_hold(&self, id: Uuid) -> Result<Option<Hold>, BookingError> {
        Ok(self.state.lock().await.holds.get(&id).cloned())
    }

    async fn release_hold(&self, id: Uuid) -> Result<(), BookingError> {
        self.state.lock().await.holds.remove(&id);
        Ok(())
    }

    async fn convert_hold(
        &self,
        hold_id: Uuid,
        draft: ReservationDraft,
    ) -> Result<Reservation, BookingError> {
        let mut state = self.state.lock().await;

        let hold = state
            .holds
            .get(&hold_id)
            .cloned()
            .ok_or(BookingError::HoldNotFound(hold_id))?;
        // Fresh clock read: the draft's timestamp predates this atomic
        // section, and a hold that lapsed in between must not convert.
        let now = Utc::now();
        if hold.expires_at <= now {
            return Err(BookingError::HoldExpired(hold_id));
        }

        let occupancy = state.occupancy(draft.schedule_id, draft.trip_date, now);
        availability::check_against_reservations(&hold.seat_ids, &occupancy)?;

        let reservation = Reservation {
            id: Uuid::new_v4(),
            schedule_id: draft.schedule_id,
            trip_date: draft.trip_date,
            kind: draft.kind,
            seat_ids: draft.seat_ids,
            customer: draft.customer,
            total_price: draft.total_price,
            status: ReservationStatus::Pending,
            created_at: draft.created_at,
            payment_deadline: draft.payment_deadline,
            confirmed_at: None,
        };

        state.reservations.insert(reservation.id, reservation.clone());
        state.holds.remove(&hold_id);
        Ok(reservation)
    }

    async fn get_reservation(&self, id: Uuid) -> Result<Option<Reservation>, BookingError> {
        Ok(self.state.lock().await.reservations.get(&id).cloned())
    }

    async fn transition_reservation(
        &self,
        id: Uuid,
        to: ReservationStatus,
        at: DateTime<Utc>,
        allowed_from: Option<ReservationStatus>,
    ) -> Result<Reservation, BookingError> {
        let mut state = self.state.lock().await;

        let reservation = state
            .reservations
            .get_mut(&id)
            .ok_or(BookingError::ReservationNotFound(id))?;
        let from = reservation.status;
        if !from.can_become(to) || allowed_from.is_some_and(|req| req != from) {
            return Err(BookingError::InvalidTransition { id, from, to });
        }

        reservation.status = to;
        if to == ReservationStatus::Confirmed {
            reservation.confirmed_at = Some(at);
        }
        Ok(reservation.clone())
    }

    async fn trip_occupancy(
        &self,
        schedule_id: Uuid,
        trip_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<TripOccupancy, BookingError> {
        Ok(self.state.lock().await.occupancy(schedule_id, trip_date, now))
    }

    async fn sweep_expired_holds(&self, now: DateTime<Utc>) -> Result<u64, BookingError> {
        let mut state = self.state.lock().await;
        let before = state.holds.len();
        state.holds.retain(|_, h| h.expires_at > now);
        Ok((before - state.holds.len()) as u64)
    }

    async fn sweep_expired_reservations(&self, now: DateTime<Utc>) -> Result<u64, BookingError> {
        let mut state = self.state.lock().await;
        let mut expired = 0;
        for r in state.reservations.values_mut() {
            if r.status == ReservationStatus::Pending && r.payment_deadline < now {
                r.status = ReservationStatus::Expired;
                expired += 1;
            }
        }
        Ok(expired)
    }
}

/// In-memory catalog keyed by schedule id.
#[derive(Default)]
pub struct MemoryCatalog {
    schedules: Mutex<HashMap<Uuid, ScheduleWithPricing>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, schedule: ScheduleWithPricing) {
        self.schedules
            .lock()
            .await
            .insert(schedule.schedule.id, schedule);
    }
}

#[async_trait]
impl ScheduleCatalog for MemoryCatalog {
    async fn schedule_with_pricing(
        &self,
        schedule_id: Uuid,
    ) -> Result<Option<ScheduleWithPricing>, BookingError> {
        Ok(self.schedules.lock().await.get(&schedule_id).cloned())
    }
}
