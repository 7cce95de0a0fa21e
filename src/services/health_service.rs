use tracing::debug;

use crate::{
    backend::BackendRole,
    dto::health::{BackendHealth, HealthResponse},
    state::{ConnectionState, SharedState},
};

/// Report backend states; degraded while telemetry or every video mixer is down.
pub fn health_status(state: &SharedState) -> HealthResponse {
    let connections = state.connections();
    let backends: Vec<BackendHealth> = connections
        .states()
        .into_iter()
        .map(|(role, state)| BackendHealth { role, state })
        .collect();
    let pending_hides = state.hide_timers().len();

    let telemetry_up = connections.state(BackendRole::Telemetry) == ConnectionState::Connected;
    let mixer_up = !connections.available_mixers().is_empty();

    if telemetry_up && mixer_up {
        HealthResponse::ok(backends, pending_hides)
    } else {
        debug!(telemetry_up, mixer_up, "reporting degraded health");
        HealthResponse::degraded(backends, pending_hides)
    }
}
