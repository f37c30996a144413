use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use busline_catalog::SeatType;

use crate::error::BookingError;

/// Snapshot of committed occupancy for one (schedule, trip_date) pair:
/// seats claimed by pending/confirmed reservations and by unexpired holds.
/// Built inside the ledger's atomic section so the collision check always
/// sees live state.
#[derive(Debug, Clone, Default)]
pub struct TripOccupancy {
    /// A pending/confirmed full-bus reservation exists; equivalent to every
    /// seat being reserved.
    pub full_bus_reserved: bool,
    pub reserved: HashSet<Uuid>,
    pub held: HashSet<Uuid>,
}

impl TripOccupancy {
    pub fn is_seat_taken(&self, seat_id: Uuid) -> bool {
        self.full_bus_reserved || self.reserved.contains(&seat_id) || self.held.contains(&seat_id)
    }
}

/// The hold-time collision check: requested seats must not intersect any
/// reservation or any other live hold, and the bus must not be booked out.
pub fn check_seats_free(requested: &[Uuid], occupancy: &TripOccupancy) -> Result<(), BookingError> {
    if occupancy.full_bus_reserved {
        return Err(BookingError::SeatCollision);
    }
    if requested
        .iter()
        .any(|s| occupancy.reserved.contains(s) || occupancy.held.contains(s))
    {
        return Err(BookingError::SeatCollision);
    }
    Ok(())
}

/// The conversion-time re-check. The hold being converted was itself a live
/// claim, so other holds are not conflicts here; only reservations that
/// raced in through a separate path are.
pub fn check_against_reservations(
    requested: &[Uuid],
    occupancy: &TripOccupancy,
) -> Result<(), BookingError> {
    if occupancy.full_bus_reserved {
        return Err(BookingError::SeatCollision);
    }
    if requested.iter().any(|s| occupancy.reserved.contains(s)) {
        return Err(BookingError::SeatCollision);
    }
    Ok(())
}

/// One seat in the search-facing availability map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatAvailability {
    pub seat_id: Uuid,
    pub seat_number: String,
    pub seat_type: SeatType,
    pub price_modifier: f64,
    pub available: bool,
}

/// Seat map for one trip instance, as shown to searching customers. Reads
/// may be slightly stale; the authoritative check re-reads at write time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripAvailability {
    pub schedule_id: Uuid,
    pub trip_date: NaiveDate,
    pub full_bus_reserved: bool,
    pub seats: Vec<SeatAvailability>,
}

impl TripAvailability {
    pub fn available_count(&self) -> usize {
        self.seats.iter().filter(|s| s.available).count()
    }
}
