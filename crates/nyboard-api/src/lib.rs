pub mod entries;
pub mod error;
pub mod leaderboard;
pub mod messages;
pub mod middleware;
pub mod session;
pub mod state;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::get,
};

pub use error::BoardError;
pub use state::{AppState, AppStateInner};

/// REST routes for the board. The WebSocket gateway is mounted by the server.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/entries", get(leaderboard::list_entries).post(entries::submit))
        .route("/entries/{name}", get(leaderboard::get_entry))
        .route("/session", get(session::current_session))
        .route("/messages", get(messages::list_messages).post(messages::post_message))
        .route("/health", get(|| async { "ok" }))
        .layer(from_fn_with_state(state.clone(), middleware::load_session))
        .with_state(state)
}
