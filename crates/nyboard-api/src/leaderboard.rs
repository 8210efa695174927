use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use nyboard_db::BoardStore;
use nyboard_types::api::EntryOrder;
use nyboard_types::models::Entry;

use crate::error::BoardError;
use crate::state::AppState;

pub const DEFAULT_TOP: u32 = 10;
pub const MAX_TOP: u32 = 100;

/// Read side of the board. Every call is a fresh snapshot of the store.
pub struct Leaderboard {
    store: Arc<dyn BoardStore>,
}

impl Leaderboard {
    pub fn new(store: Arc<dyn BoardStore>) -> Self {
        Self { store }
    }

    /// The `n` lowest ranks, ascending. Equal ranks fall back to creation
    /// time and then name.
    pub fn list_top(&self, n: u32) -> Result<Vec<Entry>, BoardError> {
        self.list(EntryOrder::Rank, n)
    }

    /// The `n` earliest entries regardless of their stored rank.
    pub fn list_top_by_created(&self, n: u32) -> Result<Vec<Entry>, BoardError> {
        self.list(EntryOrder::Created, n)
    }

    pub fn list(&self, order: EntryOrder, n: u32) -> Result<Vec<Entry>, BoardError> {
        Ok(self.store.list_entries(order, n.min(MAX_TOP))?)
    }

    pub fn rank_of(&self, name: &str) -> Result<Option<Entry>, BoardError> {
        Ok(self.store.find_entry(name.trim())?)
    }
}

#[derive(Debug, Deserialize)]
pub struct TopQuery {
    #[serde(default = "default_top")]
    pub limit: u32,
    #[serde(default)]
    pub order: EntryOrder,
}

fn default_top() -> u32 {
    DEFAULT_TOP
}

pub async fn list_entries(
    State(state): State<AppState>,
    Query(query): Query<TopQuery>,
) -> Result<impl IntoResponse, BoardError> {
    let board = state.leaderboard();
    let entries = state
        .read(move || board.list(query.order, query.limit))
        .await?;

    Ok(Json(entries))
}

pub async fn get_entry(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, BoardError> {
    let board = state.leaderboard();
    let lookup = name.clone();
    let entry = state
        .read(move || board.rank_of(&lookup))
        .await?
        .ok_or(BoardError::NotFound(name))?;

    Ok(Json(entry))
}
