use serde::Serialize;

use crate::{backend::BackendRole, state::ConnectionState};

/// Connection state of one backend role.
#[derive(Debug, Serialize)]
pub struct BackendHealth {
    /// Backend role.
    pub role: BackendRole,
    /// Current connection state.
    pub state: ConnectionState,
}

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// One entry per configured backend.
    pub backends: Vec<BackendHealth>,
    /// Hide timers currently waiting to fire.
    pub pending_hides: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(backends: Vec<BackendHealth>, pending_hides: usize) -> Self {
        Self {
            status: "ok".to_string(),
            backends,
            pending_hides,
        }
    }

    /// Create a health response indicating a mandatory backend is missing.
    pub fn degraded(backends: Vec<BackendHealth>, pending_hides: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            backends,
            pending_hides,
        }
    }
}
