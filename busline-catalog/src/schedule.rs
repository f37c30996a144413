use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a scheduled trip template.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    Active,
    Cancelled,
    Finished,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Active => "ACTIVE",
            ScheduleStatus::Cancelled => "CANCELLED",
            ScheduleStatus::Finished => "FINISHED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(ScheduleStatus::Active),
            "CANCELLED" => Some(ScheduleStatus::Cancelled),
            "FINISHED" => Some(ScheduleStatus::Finished),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatType {
    Standard,
    Premium,
}

impl SeatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatType::Standard => "STANDARD",
            SeatType::Premium => "PREMIUM",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "STANDARD" => Some(SeatType::Standard),
            "PREMIUM" => Some(SeatType::Premium),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: Uuid,
    pub origin: String,
    pub destination: String,
    /// Base fare per seat in currency units.
    pub base_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub id: Uuid,
    pub bus_id: Uuid,
    pub seat_number: String,
    pub seat_type: SeatType,
    /// Multiplicative factor applied to the base fare for this seat.
    pub price_modifier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bus {
    pub id: Uuid,
    pub name: String,
    pub capacity: i32,
    pub seats: Vec<Seat>,
}

impl Bus {
    pub fn seat(&self, seat_id: Uuid) -> Option<&Seat> {
        self.seats.iter().find(|s| s.id == seat_id)
    }

    pub fn has_seat(&self, seat_id: Uuid) -> bool {
        self.seat(seat_id).is_some()
    }
}

/// The set of weekdays a schedule operates on. A single "daily" token acts
/// as a wildcard covering every day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleDays(pub Vec<String>);

impl ScheduleDays {
    pub fn daily() -> Self {
        ScheduleDays(vec!["daily".to_string()])
    }

    pub fn includes(&self, date: NaiveDate) -> bool {
        let token = weekday_token(date.weekday());
        self.0.iter().any(|d| d == "daily" || d == token)
    }
}

pub fn weekday_token(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

/// A trip template: route + bus + departure pattern. Read-only to the
/// booking core; catalog management happens elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Uuid,
    pub route_id: Uuid,
    pub bus_id: Uuid,
    pub departure_time: NaiveTime,
    pub arrival_time: NaiveTime,
    pub days: ScheduleDays,
    pub price_multiplier: f64,
    pub status: ScheduleStatus,
}

impl Schedule {
    pub fn is_active(&self) -> bool {
        self.status == ScheduleStatus::Active
    }

    /// Whether this schedule operates on the given calendar date.
    pub fn runs_on(&self, date: NaiveDate) -> bool {
        self.days.includes(date)
    }
}

/// A schedule joined with everything the pricing and availability logic
/// needs: its route's base fare and the full seat map of its bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleWithPricing {
    pub schedule: Schedule,
    pub route: Route,
    pub bus: Bus,
}

impl ScheduleWithPricing {
    pub fn base_price(&self) -> f64 {
        self.route.base_price
    }

    pub fn price_multiplier(&self) -> f64 {
        self.schedule.price_multiplier
    }

    /// True when `seat_ids` covers every seat of the bus, i.e. the trip is
    /// fully booked out by a single party.
    pub fn covers_whole_bus(&self, seat_ids: &[Uuid]) -> bool {
        self.bus.seats.len() == seat_ids.len()
            && self.bus.seats.iter().all(|s| seat_ids.contains(&s.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn daily_wildcard_matches_every_day() {
        let days = ScheduleDays::daily();
        assert!(days.includes(date("2025-01-10"))); // friday
        assert!(days.includes(date("2025-01-12"))); // sunday
    }

    #[test]
    fn explicit_days_match_only_listed_weekdays() {
        let days = ScheduleDays(vec!["mon".into(), "fri".into()]);
        assert!(days.includes(date("2025-01-10"))); // friday
        assert!(days.includes(date("2025-01-13"))); // monday
        assert!(!days.includes(date("2025-01-11"))); // saturday
    }
}
