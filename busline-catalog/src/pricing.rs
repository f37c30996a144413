use serde::{Deserialize, Serialize};

use crate::schedule::{ScheduleWithPricing, Seat};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Multiplier applied when a single party books out the entire bus.
    pub full_bus_discount: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            full_bus_discount: 0.9,
        }
    }
}

/// Pure fare calculator. No I/O, no side effects; totals are computed in
/// full precision and rounded to currency precision exactly once.
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    /// Sum of per-seat fares: base_price * schedule multiplier * seat modifier.
    pub fn seats_price(&self, schedule: &ScheduleWithPricing, seats: &[&Seat]) -> f64 {
        let per_trip = schedule.base_price() * schedule.price_multiplier();
        let total: f64 = seats.iter().map(|s| per_trip * s.price_modifier).sum();
        round_currency(total)
    }

    /// Discounted fare for booking out the whole bus. Seat modifiers do not
    /// apply; the discount is against capacity at the plain per-seat fare.
    pub fn full_bus_price(&self, schedule: &ScheduleWithPricing) -> f64 {
        let per_trip = schedule.base_price() * schedule.price_multiplier();
        let total = per_trip * schedule.bus.capacity as f64 * self.config.full_bus_discount;
        round_currency(total)
    }
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::new(PricingConfig::default())
    }
}

/// Round to 2 decimal places. Applied once, on the final total, so per-seat
/// rounding error cannot compound.
pub fn round_currency(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{Bus, Route, Schedule, ScheduleDays, ScheduleStatus, SeatType};
    use chrono::NaiveTime;
    use uuid::Uuid;

    fn seat(bus_id: Uuid, number: &str, modifier: f64) -> Seat {
        Seat {
            id: Uuid::new_v4(),
            bus_id,
            seat_number: number.to_string(),
            seat_type: if modifier > 1.0 {
                SeatType::Premium
            } else {
                SeatType::Standard
            },
            price_modifier: modifier,
        }
    }

    fn schedule_with(base_price: f64, multiplier: f64, modifiers: &[f64]) -> ScheduleWithPricing {
        let bus_id = Uuid::new_v4();
        let seats: Vec<Seat> = modifiers
            .iter()
            .enumerate()
            .map(|(i, m)| seat(bus_id, &format!("{}", i + 1), *m))
            .collect();
        let capacity = seats.len() as i32;

        ScheduleWithPricing {
            schedule: Schedule {
                id: Uuid::new_v4(),
                route_id: Uuid::new_v4(),
                bus_id,
                departure_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                arrival_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
                days: ScheduleDays::daily(),
                price_multiplier: multiplier,
                status: ScheduleStatus::Active,
            },
            route: Route {
                id: Uuid::new_v4(),
                origin: "Lima".to_string(),
                destination: "Ica".to_string(),
                base_price,
            },
            bus: Bus {
                id: bus_id,
                name: "Unit 12".to_string(),
                capacity,
                seats,
            },
        }
    }

    #[test]
    fn seat_total_rounds_once_at_the_end() {
        let sched = schedule_with(280.0, 1.1, &[1.0, 1.25]);
        let engine = PricingEngine::default();

        let seats: Vec<&Seat> = sched.bus.seats.iter().collect();
        // 280*1.1*1.0 + 280*1.1*1.25 = 308.00 + 385.00
        assert_eq!(engine.seats_price(&sched, &seats), 693.00);
    }

    #[test]
    fn full_bus_applies_discount_over_capacity() {
        let modifiers = vec![1.0; 40];
        let sched = schedule_with(180.0, 1.05, &modifiers);
        let engine = PricingEngine::default();

        // 180 * 1.05 * 40 * 0.9
        assert_eq!(engine.full_bus_price(&sched), 6804.00);
    }

    #[test]
    fn full_bus_discount_is_configurable() {
        let modifiers = vec![1.0; 10];
        let sched = schedule_with(100.0, 1.0, &modifiers);
        let engine = PricingEngine::new(PricingConfig {
            full_bus_discount: 0.8,
        });

        assert_eq!(engine.full_bus_price(&sched), 800.00);
    }

    #[test]
    fn rounding_happens_only_on_the_total() {
        // Each seat prices to 33.333...; per-seat rounding would give 99.99.
        let sched = schedule_with(33.333333, 1.0, &[1.0, 1.0, 1.0]);
        let engine = PricingEngine::default();

        let seats: Vec<&Seat> = sched.bus.seats.iter().collect();
        assert_eq!(engine.seats_price(&sched, &seats), 100.00);
    }
}
