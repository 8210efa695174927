use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS entries (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL UNIQUE,
            rank        INTEGER NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_entries_rank
            ON entries(rank, created_at, name);

        CREATE INDEX IF NOT EXISTS idx_entries_created
            ON entries(created_at, name);

        CREATE TABLE IF NOT EXISTS messages (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            message     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_created
            ON messages(created_at);

        CREATE TABLE IF NOT EXISTS counters (
            id          TEXT PRIMARY KEY,
            value       INTEGER NOT NULL
        );

        -- The rank counter starts at the number of entries already present
        INSERT OR IGNORE INTO counters (id, value)
            VALUES ('entries', (SELECT COUNT(*) FROM entries));
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
