use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{services::command_service, state::SharedState};

/// Upgrade the HTTP connection into a command-channel WebSocket session.
pub async fn ws_handler(
    State(state): State<SharedState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| command_service::handle_socket(state, socket))
}

/// Configure the command-channel endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
}
