use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;

use nyboard_db::BoardStore;
use nyboard_types::api::PostMessageRequest;
use nyboard_types::events::GatewayEvent;
use nyboard_types::models::Message;
use nyboard_types::validate::validate_message;

use crate::error::BoardError;
use crate::session::Session;
use crate::state::AppState;

pub const DEFAULT_RECENT: u32 = 20;
pub const MAX_RECENT: u32 = 100;

/// Short public notes from participants who already hold a rank.
pub struct MessageBoard {
    store: Arc<dyn BoardStore>,
}

impl MessageBoard {
    pub fn new(store: Arc<dyn BoardStore>) -> Self {
        Self { store }
    }

    pub fn can_post(session: &Session) -> bool {
        session.submitted().is_some()
    }

    /// Append `raw` attributed to the session's recorded name.
    pub fn post(&self, session: &Session, raw: &str) -> Result<Message, BoardError> {
        let Some(author) = session.submitted() else {
            return Err(BoardError::NotEligible);
        };
        let text = validate_message(raw)?;

        Ok(self.store.append_message(&author.name, text)?)
    }

    /// The `n` newest messages, newest first.
    pub fn list_recent(&self, n: u32) -> Result<Vec<Message>, BoardError> {
        Ok(self.store.list_messages(n.min(MAX_RECENT))?)
    }
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    #[serde(default = "default_recent")]
    pub limit: u32,
}

fn default_recent() -> u32 {
    DEFAULT_RECENT
}

pub async fn post_message(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<PostMessageRequest>,
) -> Result<impl IntoResponse, BoardError> {
    let board = state.message_board();
    let message = state
        .write(move || board.post(&session, &req.message))
        .await?;

    info!("{} posted a message", message.name);
    state.dispatcher.broadcast(GatewayEvent::MessageCreate {
        message: message.clone(),
    });

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<impl IntoResponse, BoardError> {
    let board = state.message_board();
    let messages = state
        .read(move || board.list_recent(query.limit))
        .await?;

    Ok(Json(messages))
}
