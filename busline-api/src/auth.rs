use axum::http::HeaderMap;

use crate::error::AppError;
use crate::state::AppState;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Explicit admin capability check: the caller presents the configured
/// token per request instead of relying on ambient session state.
pub fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    if is_admin(state, headers) {
        Ok(())
    } else {
        Err(AppError::AuthorizationError(
            "admin token required".to_string(),
        ))
    }
}

pub fn is_admin(state: &AppState, headers: &HeaderMap) -> bool {
    headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|token| token == state.auth.admin_token)
        .unwrap_or(false)
}
