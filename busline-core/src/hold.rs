use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use busline_catalog::ScheduleWithPricing;

use crate::availability::{SeatAvailability, TripAvailability};
use crate::error::BookingError;
use crate::repository::{AvailabilityLedger, ScheduleCatalog};
use crate::rules::BookingRules;

/// A temporary exclusive claim on a set of seats for one trip instance.
/// Possession of the id is the capability to convert or release it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hold {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub trip_date: NaiveDate,
    pub seat_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Hold {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Creates, queries and releases seat holds, enforcing the no-collision
/// invariant through the ledger's atomic create.
pub struct HoldManager {
    ledger: Arc<dyn AvailabilityLedger>,
    catalog: Arc<dyn ScheduleCatalog>,
    rules: BookingRules,
}

impl HoldManager {
    pub fn new(
        ledger: Arc<dyn AvailabilityLedger>,
        catalog: Arc<dyn ScheduleCatalog>,
        rules: BookingRules,
    ) -> Self {
        Self {
            ledger,
            catalog,
            rules,
        }
    }

    /// Validate the request, then atomically claim the seats. No transaction
    /// is opened when validation fails.
    pub async fn create_hold(
        &self,
        schedule_id: Uuid,
        trip_date: NaiveDate,
        seat_ids: &[Uuid],
    ) -> Result<Hold, BookingError> {
        if seat_ids.is_empty() {
            return Err(BookingError::validation("seat list must not be empty"));
        }
        let seat_ids = dedupe(seat_ids);

        let schedule = self.lookup_schedule(schedule_id).await?;
        if !schedule.schedule.is_active() {
            return Err(BookingError::ScheduleInactive(schedule_id));
        }
        if !schedule.schedule.runs_on(trip_date) {
            return Err(BookingError::validation(format!(
                "schedule {} does not run on {}",
                schedule_id, trip_date
            )));
        }
        for seat_id in &seat_ids {
            if !schedule.bus.has_seat(*seat_id) {
                return Err(BookingError::validation(format!(
                    "seat {} does not belong to the assigned bus",
                    seat_id
                )));
            }
        }

        let expires_at = Utc::now() + self.rules.hold_duration;
        let hold = self
            .ledger
            .create_hold(schedule_id, trip_date, &seat_ids, expires_at)
            .await?;

        info!(
            hold_id = %hold.id,
            schedule_id = %schedule_id,
            trip_date = %trip_date,
            seats = seat_ids.len(),
            "seat hold created"
        );
        Ok(hold)
    }

    /// Idempotent: releasing an already-deleted or swept hold is Ok.
    pub async fn release_hold(&self, hold_id: Uuid) -> Result<(), BookingError> {
        self.ledger.release_hold(hold_id).await?;
        debug!(hold_id = %hold_id, "seat hold released");
        Ok(())
    }

    /// Seat map for the search flow. Tolerates slightly stale reads; the
    /// ledger re-checks at write time.
    pub async fn availability(
        &self,
        schedule_id: Uuid,
        trip_date: NaiveDate,
    ) -> Result<TripAvailability, BookingError> {
        let schedule = self.lookup_schedule(schedule_id).await?;
        if !schedule.schedule.runs_on(trip_date) {
            return Err(BookingError::validation(format!(
                "schedule {} does not run on {}",
                schedule_id, trip_date
            )));
        }

        let occupancy = self
            .ledger
            .trip_occupancy(schedule_id, trip_date, Utc::now())
            .await?;

        let seats = schedule
            .bus
            .seats
            .iter()
            .map(|seat| SeatAvailability {
                seat_id: seat.id,
                seat_number: seat.seat_number.clone(),
                seat_type: seat.seat_type,
                price_modifier: seat.price_modifier,
                available: !occupancy.is_seat_taken(seat.id),
            })
            .collect();

        Ok(TripAvailability {
            schedule_id,
            trip_date,
            full_bus_reserved: occupancy.full_bus_reserved,
            seats,
        })
    }

    async fn lookup_schedule(
        &self,
        schedule_id: Uuid,
    ) -> Result<ScheduleWithPricing, BookingError> {
        self.catalog
            .schedule_with_pricing(schedule_id)
            .await?
            .ok_or_else(|| BookingError::validation(format!("unknown schedule: {}", schedule_id)))
    }
}

fn dedupe(seat_ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = std::collections::HashSet::new();
    seat_ids
        .iter()
        .filter(|id| seen.insert(**id))
        .copied()
        .collect()
}
