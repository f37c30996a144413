pub mod pricing;
pub mod schedule;

pub use pricing::{PricingConfig, PricingEngine};
pub use schedule::{Bus, Route, Schedule, ScheduleDays, ScheduleStatus, ScheduleWithPricing, Seat, SeatType};
