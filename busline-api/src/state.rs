use std::sync::Arc;

use busline_core::{ExpirySweeper, HoldManager, ReservationManager};

#[derive(Clone)]
pub struct AuthConfig {
    /// Capability token for admin-gated operations. Presented explicitly
    /// per request; there is no ambient session state.
    pub admin_token: String,
}

#[derive(Clone)]
pub struct AppState {
    pub hold_manager: Arc<HoldManager>,
    pub reservation_manager: Arc<ReservationManager>,
    pub sweeper: Arc<ExpirySweeper>,
    pub auth: AuthConfig,
}
