use std::fmt::Display;
use std::io::Write;
use std::path::PathBuf;

use anyhow::anyhow;
use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::Message as Frame;
use tracing::{info, warn};

use nyboard_types::api::EntryOrder;
use nyboard_types::events::GatewayEvent;
use nyboard_types::validate::{validate_message, validate_name};

use crate::client::ApiClient;
use crate::error::ClientError;
use crate::local::{LocalState, RequestGuard};
use crate::render;

pub const DEFAULT_TOP: u32 = 10;
pub const DEFAULT_RECENT: u32 = 20;

/// The client-side counterpart of the board page: every command validates
/// locally, talks to the server, and returns the text to show.
pub struct App {
    client: ApiClient,
    state_path: PathBuf,
}

impl App {
    pub fn new(client: ApiClient, state_path: PathBuf) -> Self {
        Self { client, state_path }
    }

    pub async fn submit(&self, raw_name: &str) -> Result<String, ClientError> {
        let name = validate_name(raw_name)?;

        let _guard = RequestGuard::acquire(&self.state_path)?;
        let mut state = LocalState::load(&self.state_path)?;
        if let Some((name, rank)) = state.submission() {
            return Err(ClientError::AlreadySubmitted {
                name: name.to_string(),
                rank,
            });
        }

        let submitted = self.client.submit(name).await?;
        state.record(&submitted);
        state.save(&self.state_path)?;
        info!("Submitted {} at rank {}", submitted.entry.name, submitted.entry.rank);

        let mut out = render::submitted(&submitted.entry);
        out.push_str(&refreshed(self.top_text(DEFAULT_TOP, EntryOrder::Rank, Some(&submitted.entry.name)).await));
        Ok(out)
    }

    pub async fn top(&self, limit: u32, order: EntryOrder) -> Result<String, ClientError> {
        let state = LocalState::load(&self.state_path)?;
        let me = state.submission().map(|(name, _)| name);
        self.top_text(limit, order, me).await
    }

    pub async fn post(&self, raw: &str) -> Result<String, ClientError> {
        let _guard = RequestGuard::acquire(&self.state_path)?;
        let state = LocalState::load(&self.state_path)?;
        let (Some(_), Some(token)) = (state.submission(), state.token.as_deref()) else {
            return Err(ClientError::NotEligible);
        };
        let text = validate_message(raw)?;

        self.client.post(token, text).await?;

        let mut out = String::from("Posted.\n");
        out.push_str(&refreshed(self.messages(DEFAULT_RECENT).await));
        Ok(out)
    }

    pub async fn messages(&self, limit: u32) -> Result<String, ClientError> {
        let messages = self.client.messages(limit).await?;
        Ok(render::messages(&messages))
    }

    pub async fn whoami(&self) -> Result<String, ClientError> {
        let state = LocalState::load(&self.state_path)?;
        let (Some((name, rank)), Some(token)) = (state.submission(), state.token.as_deref()) else {
            return Ok("Not submitted yet.\n".to_string());
        };

        let session = self.client.session(token).await?;
        let mut out = format!("{} (#{})\n", name, rank);
        if !session.can_post {
            out.push_str("The server no longer accepts this client's token; posting is disabled.\n");
        }
        Ok(out)
    }

    /// Re-render the board on every gateway event until the server hangs up.
    pub async fn watch<W: Write>(&self, out: &mut W) -> Result<(), ClientError> {
        let url = self.client.gateway_url();
        let (mut socket, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| anyhow!("connecting to {}: {}", url, e))?;

        while let Some(frame) = socket.next().await {
            let frame = frame.map_err(|e| anyhow!("gateway: {}", e))?;
            let Frame::Text(text) = frame else {
                continue;
            };

            match serde_json::from_str::<GatewayEvent>(text.as_str()) {
                Ok(_) => {
                    let screen = self.screen().await?;
                    write!(out, "{screen}").map_err(anyhow::Error::from)?;
                    out.flush().map_err(anyhow::Error::from)?;
                }
                Err(e) => warn!("Unrecognised gateway event: {}", e),
            }
        }

        Ok(())
    }

    async fn screen(&self) -> Result<String, ClientError> {
        let mut screen = String::from("\n== Top 10 ==\n");
        screen.push_str(&self.top(DEFAULT_TOP, EntryOrder::Rank).await?);
        screen.push_str("== Messages ==\n");
        screen.push_str(&self.messages(DEFAULT_RECENT).await?);
        Ok(screen)
    }

    async fn top_text(&self, limit: u32, order: EntryOrder, me: Option<&str>) -> Result<String, ClientError> {
        let entries = self.client.top(limit, order).await?;
        Ok(render::leaderboard(&entries, me))
    }
}

/// A follow-up refresh failing must not hide the write that already landed.
fn refreshed(result: Result<String, impl Display>) -> String {
    result.unwrap_or_else(|e| format!("(could not refresh: {e})\n"))
}
