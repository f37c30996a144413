use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::error::BookingError;
use crate::repository::AvailabilityLedger;

/// Reclaims abandoned holds and expires unpaid reservations. Both sweeps
/// are single bulk conditional statements: idempotent, safe to invoke
/// repeatedly and concurrently with themselves and with the managers.
/// Scheduling (timer or endpoint) is owned by the caller.
pub struct ExpirySweeper {
    ledger: Arc<dyn AvailabilityLedger>,
}

impl ExpirySweeper {
    pub fn new(ledger: Arc<dyn AvailabilityLedger>) -> Self {
        Self { ledger }
    }

    /// Delete every hold whose `expires_at` has passed; returns the count.
    pub async fn sweep_expired_holds(&self) -> Result<u64, BookingError> {
        let removed = self.ledger.sweep_expired_holds(Utc::now()).await?;
        if removed > 0 {
            info!(removed, "swept expired holds");
        }
        Ok(removed)
    }

    /// Mark overdue pending reservations as expired; returns the count.
    /// Confirmed and cancelled rows are left alone regardless of deadline.
    pub async fn sweep_expired_reservations(&self) -> Result<u64, BookingError> {
        let expired = self.ledger.sweep_expired_reservations(Utc::now()).await?;
        if expired > 0 {
            info!(expired, "expired overdue pending reservations");
        }
        Ok(expired)
    }
}
