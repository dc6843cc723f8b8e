//! WebSocket Endpoint
//!
//! Upgrades `GET /ws` and hands the socket to a client session.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;

use crate::infrastructure::server::AppState;

pub mod session;

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let settings = state.websocket.clone();
    let hub = state.hub.clone();

    ws.read_buffer_size(settings.read_buffer_size)
        .write_buffer_size(settings.write_buffer_size)
        .max_message_size(settings.max_message_size)
        .on_upgrade(move |socket| session::run(socket, hub, settings))
}
