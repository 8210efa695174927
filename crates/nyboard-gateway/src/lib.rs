pub mod connection;
pub mod dispatcher;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::connection::Heartbeat;
use crate::dispatcher::Dispatcher;

#[derive(Clone)]
struct GatewayState {
    dispatcher: Dispatcher,
    heartbeat: Heartbeat,
}

/// `GET /gateway`, upgrading to the event WebSocket.
pub fn router(dispatcher: Dispatcher, heartbeat: Heartbeat) -> Router {
    Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(GatewayState {
            dispatcher,
            heartbeat,
        })
}

async fn ws_upgrade(State(state): State<GatewayState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.dispatcher, state.heartbeat)
    })
}
