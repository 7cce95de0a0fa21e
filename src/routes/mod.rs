use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

/// Command-channel WebSocket routes.
pub mod command;
/// Health check routes.
pub mod health;

/// Compose all route trees, wiring in shared state and request tracing.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(command::router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
