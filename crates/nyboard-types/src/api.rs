use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Entry;

// -- Session token --

/// Claims carried by the token a client receives after a successful
/// submission. Shared by nyboard-api (issuing/verifying) and nyboard-cli
/// (which only stores the opaque token string).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub rank: u64,
    pub exp: usize,
}

// -- Entries --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub entry: Entry,
    pub token: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryOrder {
    /// Smallest rank first, then creation time, then name.
    #[default]
    Rank,
    /// Earliest creation time first, then name.
    Created,
}

// -- Session --

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub name: Option<String>,
    pub rank: Option<u64>,
    pub can_post: bool,
}

// -- Messages --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostMessageRequest {
    pub message: String,
}

// -- Errors --

/// Body of every non-2xx response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}
