use chrono::Local;

use nyboard_types::models::{Entry, Message};

/// The leaderboard as numbered lines, marking this client's own entry.
pub fn leaderboard(entries: &[Entry], me: Option<&str>) -> String {
    if entries.is_empty() {
        return "  (nobody yet, be the first)\n".to_string();
    }

    let width = entries
        .iter()
        .map(|e| e.rank.to_string().len())
        .max()
        .unwrap_or(1);

    let mut out = String::new();
    for entry in entries {
        let marker = if Some(entry.name.as_str()) == me { "  <- you" } else { "" };
        out.push_str(&format!("  {:>width$}. {}{}\n", entry.rank, entry.name, marker));
    }
    out
}

pub fn messages(messages: &[Message]) -> String {
    if messages.is_empty() {
        return "  (no messages yet)\n".to_string();
    }

    let mut out = String::new();
    for message in messages {
        let at = message.created_at.with_timezone(&Local).format("%m-%d %H:%M");
        out.push_str(&format!("  [{}] {}: {}\n", at, message.name, message.message));
    }
    out
}

pub fn submitted(entry: &Entry) -> String {
    format!("Welcome {}! You are #{}.\n", entry.name, entry.rank)
}
