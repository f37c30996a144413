use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use busline_catalog::{PricingEngine, ScheduleWithPricing, Seat};
use busline_shared::pii::Masked;

use crate::error::BookingError;
use crate::repository::{AvailabilityLedger, ScheduleCatalog};
use crate::rules::BookingRules;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
    Expired,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::Confirmed => "CONFIRMED",
            ReservationStatus::Cancelled => "CANCELLED",
            ReservationStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ReservationStatus::Pending),
            "CONFIRMED" => Some(ReservationStatus::Confirmed),
            "CANCELLED" => Some(ReservationStatus::Cancelled),
            "EXPIRED" => Some(ReservationStatus::Expired),
            _ => None,
        }
    }

    /// The reservation state machine. Cancelled and expired are terminal;
    /// confirmed can only be cancelled by an operator.
    pub fn can_become(&self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Pending, Expired) | (Confirmed, Cancelled)
        )
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationKind {
    Seats,
    FullBus,
}

impl ReservationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationKind::Seats => "SEATS",
            ReservationKind::FullBus => "FULL_BUS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SEATS" => Some(ReservationKind::Seats),
            "FULL_BUS" => Some(ReservationKind::FullBus),
            _ => None,
        }
    }
}

/// Contact details captured at conversion time. Phone and email are wrapped
/// so debug logging cannot leak them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerContact {
    pub name: String,
    pub phone: Masked<String>,
    pub email: Masked<String>,
}

/// A committed booking, pending payment proof until its deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub trip_date: NaiveDate,
    pub kind: ReservationKind,
    /// Empty for full-bus reservations; the collision check treats those as
    /// occupying every seat.
    pub seat_ids: Vec<Uuid>,
    pub customer: CustomerContact,
    pub total_price: f64,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub payment_deadline: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

/// Everything the ledger needs to write a new pending reservation inside
/// the conversion transaction.
#[derive(Debug, Clone)]
pub struct ReservationDraft {
    pub schedule_id: Uuid,
    pub trip_date: NaiveDate,
    pub kind: ReservationKind,
    pub seat_ids: Vec<Uuid>,
    pub customer: CustomerContact,
    pub total_price: f64,
    pub created_at: DateTime<Utc>,
    pub payment_deadline: DateTime<Utc>,
}

/// Reservation joined with catalog metadata for the detail endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationDetail {
    pub reservation: Reservation,
    pub origin: String,
    pub destination: String,
    pub bus_name: String,
    pub departure_time: NaiveTime,
    /// Resolved seat records; empty for full-bus reservations.
    pub seats: Vec<Seat>,
}

/// Converts holds into priced pending reservations and drives the
/// pending → confirmed/cancelled lifecycle.
pub struct ReservationManager {
    ledger: Arc<dyn AvailabilityLedger>,
    catalog: Arc<dyn ScheduleCatalog>,
    pricing: PricingEngine,
    rules: BookingRules,
}

impl ReservationManager {
    pub fn new(
        ledger: Arc<dyn AvailabilityLedger>,
        catalog: Arc<dyn ScheduleCatalog>,
        pricing: PricingEngine,
        rules: BookingRules,
    ) -> Self {
        Self {
            ledger,
            catalog,
            pricing,
            rules,
        }
    }

    /// Convert a live hold into a pending reservation. The fast-path expiry
    /// check here is advisory; the ledger re-validates the hold under lock,
    /// so an expired or raced hold can never convert.
    pub async fn create_reservation(
        &self,
        hold_id: Uuid,
        customer: CustomerContact,
    ) -> Result<Reservation, BookingError> {
        let hold = self
            .ledger
            .get_hold(hold_id)
            .await?
            .ok_or(BookingError::HoldNotFound(hold_id))?;

        let now = Utc::now();
        if hold.is_expired(now) {
            return Err(BookingError::HoldExpired(hold_id));
        }

        let schedule = self
            .catalog
            .schedule_with_pricing(hold.schedule_id)
            .await?
            .ok_or(BookingError::ScheduleInactive(hold.schedule_id))?;
        if !schedule.schedule.is_active() {
            return Err(BookingError::ScheduleInactive(hold.schedule_id));
        }

        let (kind, total_price) = self.price_hold(&schedule, &hold.seat_ids)?;

        let draft = ReservationDraft {
            schedule_id: hold.schedule_id,
            trip_date: hold.trip_date,
            kind,
            seat_ids: if kind == ReservationKind::FullBus {
                Vec::new()
            } else {
                hold.seat_ids.clone()
            },
            customer,
            total_price,
            created_at: now,
            payment_deadline: now + self.rules.reservation_timeout,
        };

        let reservation = self.ledger.convert_hold(hold_id, draft).await?;

        info!(
            reservation_id = %reservation.id,
            schedule_id = %reservation.schedule_id,
            trip_date = %reservation.trip_date,
            kind = reservation.kind.as_str(),
            total_price = reservation.total_price,
            "reservation created from hold"
        );
        Ok(reservation)
    }

    /// A hold covering every seat of the bus becomes a discounted full-bus
    /// reservation; anything else prices per seat.
    fn price_hold(
        &self,
        schedule: &ScheduleWithPricing,
        seat_ids: &[Uuid],
    ) -> Result<(ReservationKind, f64), BookingError> {
        if schedule.covers_whole_bus(seat_ids) {
            return Ok((
                ReservationKind::FullBus,
                self.pricing.full_bus_price(schedule),
            ));
        }

        let mut seats = Vec::with_capacity(seat_ids.len());
        for seat_id in seat_ids {
            let seat = schedule.bus.seat(*seat_id).ok_or_else(|| {
                BookingError::validation(format!(
                    "seat {} does not belong to the assigned bus",
                    seat_id
                ))
            })?;
            seats.push(seat);
        }
        Ok((
            ReservationKind::Seats,
            self.pricing.seats_price(schedule, &seats),
        ))
    }

    pub async fn get_reservation(&self, id: Uuid) -> Result<ReservationDetail, BookingError> {
        let reservation = self
            .ledger
            .get_reservation(id)
            .await?
            .ok_or(BookingError::ReservationNotFound(id))?;

        let schedule = self
            .catalog
            .schedule_with_pricing(reservation.schedule_id)
            .await?
            .ok_or(BookingError::ReservationNotFound(id))?;

        let seats = reservation
            .seat_ids
            .iter()
            .filter_map(|seat_id| schedule.bus.seat(*seat_id).cloned())
            .collect();

        Ok(ReservationDetail {
            reservation,
            origin: schedule.route.origin,
            destination: schedule.route.destination,
            bus_name: schedule.bus.name,
            departure_time: schedule.schedule.departure_time,
            seats,
        })
    }

    /// Operator acknowledges payment proof. Only pending reservations can
    /// confirm; the ledger guards the transition atomically.
    pub async fn confirm_reservation(&self, id: Uuid) -> Result<Reservation, BookingError> {
        let reservation = self
            .ledger
            .transition_reservation(id, ReservationStatus::Confirmed, Utc::now(), None)
            .await?;
        info!(reservation_id = %id, "reservation confirmed");
        Ok(reservation)
    }

    /// Allowed from pending or confirmed; terminal states reject. Without
    /// the operator capability only a pending reservation may cancel, and
    /// the status is compared inside the ledger's locked transition, so a
    /// concurrent confirm cannot slip a confirmed row past the check.
    pub async fn cancel_reservation(
        &self,
        id: Uuid,
        operator: bool,
    ) -> Result<Reservation, BookingError> {
        let allowed_from = if operator {
            None
        } else {
            Some(ReservationStatus::Pending)
        };
        let reservation = self
            .ledger
            .transition_reservation(id, ReservationStatus::Cancelled, Utc::now(), allowed_from)
            .await?;
        info!(reservation_id = %id, operator, "reservation cancelled");
        Ok(reservation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_admits_all_three_exits() {
        use ReservationStatus::*;
        assert!(Pending.can_become(Confirmed));
        assert!(Pending.can_become(Cancelled));
        assert!(Pending.can_become(Expired));
    }

    #[test]
    fn confirmed_only_cancels() {
        use ReservationStatus::*;
        assert!(Confirmed.can_become(Cancelled));
        assert!(!Confirmed.can_become(Expired));
        assert!(!Confirmed.can_become(Pending));
        assert!(!Confirmed.can_become(Confirmed));
    }

    #[test]
    fn cancelled_and_expired_are_terminal() {
        use ReservationStatus::*;
        for terminal in [Cancelled, Expired] {
            for next in [Pending, Confirmed, Cancelled, Expired] {
                assert!(!terminal.can_become(next));
            }
        }
    }
}
