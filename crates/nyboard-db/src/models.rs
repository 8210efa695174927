//! Database row types. These map directly to SQLite rows; conversion into
//! the nyboard-types models happens here so the rest of the crate never sees
//! raw strings for ids or timestamps.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use tracing::warn;
use uuid::Uuid;

use nyboard_types::models::{Entry, Message};

pub struct EntryRow {
    pub id: String,
    pub name: String,
    pub rank: i64,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub name: String,
    pub message: String,
    pub created_at: String,
}

impl From<EntryRow> for Entry {
    fn from(row: EntryRow) -> Self {
        Entry {
            id: parse_id(&row.id),
            rank: u64::try_from(row.rank).unwrap_or_else(|_| {
                warn!("Corrupt rank {} on entry '{}'", row.rank, row.id);
                0
            }),
            created_at: parse_timestamp(&row.created_at, &row.id),
            name: row.name,
        }
    }
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            id: parse_id(&row.id),
            created_at: parse_timestamp(&row.created_at, &row.id),
            name: row.name,
            message: row.message,
        }
    }
}

/// Fixed-width RFC 3339 so that text order matches time order.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_id(raw: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt id '{}': {}", raw, e);
        Uuid::default()
    })
}

fn parse_timestamp(raw: &str, id: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by hand through the sqlite shell use datetime('now').
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on '{}': {}", raw, id, e);
            DateTime::default()
        })
}
