use chrono::Duration;

/// Time-bound policy for the booking lifecycle. Sourced from configuration
/// at startup; the core never reads config itself.
#[derive(Debug, Clone)]
pub struct BookingRules {
    /// How long a hold keeps seats claimed while the customer fills in
    /// contact details.
    pub hold_duration: Duration,
    /// How long a pending reservation waits for payment proof before the
    /// sweeper expires it.
    pub reservation_timeout: Duration,
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            hold_duration: Duration::minutes(15),
            reservation_timeout: Duration::minutes(15),
        }
    }
}
