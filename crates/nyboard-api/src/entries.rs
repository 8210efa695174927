use std::str::FromStr;
use std::sync::Arc;

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{error, info};

use nyboard_db::BoardStore;
use nyboard_types::api::{SubmitRequest, SubmitResponse};
use nyboard_types::events::GatewayEvent;
use nyboard_types::models::Entry;
use nyboard_types::validate::validate_name;

use crate::error::BoardError;
use crate::session::{Session, Submitted};
use crate::state::AppState;

/// How a new entry's rank is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RankPolicy {
    /// Counter bump and write in one store transaction. Ranks stay
    /// contiguous and unique under concurrent submissions.
    #[default]
    Atomic,
    /// Count the entries, then write `count + 1` in a second call. Two
    /// clients racing between the calls can both get the same rank.
    Parity,
}

impl FromStr for RankPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "atomic" => Ok(Self::Atomic),
            "parity" => Ok(Self::Parity),
            other => anyhow::bail!("unknown rank policy '{}' (expected atomic or parity)", other),
        }
    }
}

#[derive(Clone)]
pub struct RankAssigner {
    store: Arc<dyn BoardStore>,
    policy: RankPolicy,
}

impl RankAssigner {
    pub fn new(store: Arc<dyn BoardStore>, policy: RankPolicy) -> Self {
        Self { store, policy }
    }

    /// Claim the next rank for `raw_name` on behalf of `session`.
    ///
    /// The name is checked before anything else and before the store is
    /// touched. On success the session records the new entry, which closes
    /// it to further submissions and opens the message board.
    pub fn submit(&self, session: &mut Session, raw_name: &str) -> Result<Entry, BoardError> {
        let name = validate_name(raw_name)?;

        if session.submitted().is_some() {
            return Err(BoardError::AlreadySubmitted);
        }

        let entry = match self.policy {
            RankPolicy::Atomic => self.store.write_entry_next_rank(name)?,
            RankPolicy::Parity => {
                let count = self.store.count_entries()?;
                self.store.write_entry(name, count + 1)?
            }
        };

        session.record(&entry);
        Ok(entry)
    }
}

pub async fn submit(
    State(state): State<AppState>,
    Extension(mut session): Extension<Session>,
    Json(req): Json<SubmitRequest>,
) -> Result<impl IntoResponse, BoardError> {
    let assigner = state.rank_assigner();
    let entry = state
        .write(move || assigner.submit(&mut session, &req.name))
        .await?;

    // The entry is on the board from here on, whatever happens to the token.
    info!("{} claimed rank {}", entry.name, entry.rank);
    state.dispatcher.broadcast(GatewayEvent::EntryCreate {
        entry: entry.clone(),
    });

    let token = state.tokens.issue(&Submitted::from(&entry)).map_err(|e| {
        error!(
            "Entry {} ({}, rank {}) stored but no session token was issued",
            entry.id, entry.name, entry.rank
        );
        BoardError::RequestFailed(e)
    })?;

    Ok((StatusCode::CREATED, Json(SubmitResponse { entry, token })))
}
