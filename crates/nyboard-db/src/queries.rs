use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use tracing::debug;
use uuid::Uuid;

use nyboard_types::api::EntryOrder;
use nyboard_types::models::{Entry, Message};

use crate::Database;
use crate::models::{EntryRow, MessageRow, format_timestamp};
use crate::store::{BoardStore, ENTRY_COUNTER, StoreError};

const ENTRY_COLUMNS: &str = "id, name, rank, created_at";

impl BoardStore for Database {
    // -- Entries --

    fn count_entries(&self) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }

    fn list_entries(&self, order: EntryOrder, limit: u32) -> Result<Vec<Entry>, StoreError> {
        self.with_conn(|conn| query_entries(conn, order, limit))
    }

    fn find_entry(&self, name: &str) -> Result<Option<Entry>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE name = ?1");
            let row = conn.query_row(&sql, [name], entry_row).optional()?;
            Ok(row.map(Entry::from))
        })
    }

    fn write_entry(&self, name: &str, rank: u64) -> Result<Entry, StoreError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let entry = insert_entry(&tx, name, rank)?;
            // Keep the counter ahead of hand-picked ranks so switching policy
            // never reissues one.
            tx.execute(
                "UPDATE counters SET value = MAX(value, ?2) WHERE id = ?1",
                params![ENTRY_COUNTER, rank as i64],
            )?;
            tx.commit()?;
            Ok(entry)
        })
    }

    fn write_entry_next_rank(&self, name: &str) -> Result<Entry, StoreError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let rank = increment_counter(&tx, ENTRY_COUNTER)?;
            // On a duplicate the transaction drops here and rolls back the bump.
            let entry = insert_entry(&tx, name, rank)?;
            tx.commit()?;
            Ok(entry)
        })
    }

    fn atomic_increment_and_get(&self, counter_id: &str) -> Result<u64, StoreError> {
        self.with_conn(|conn| increment_counter(conn, counter_id))
    }

    // -- Messages --

    fn append_message(&self, name: &str, message: &str) -> Result<Message, StoreError> {
        let row = MessageRow {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            message: message.to_string(),
            created_at: format_timestamp(Utc::now()),
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, name, message, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![row.id, row.name, row.message, row.created_at],
            )?;
            Ok(())
        })?;

        Ok(row.into())
    }

    fn list_messages(&self, limit: u32) -> Result<Vec<Message>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, message, created_at
                 FROM messages
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?1",
            )?;

            let rows = stmt
                .query_map([limit], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        message: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows.into_iter().map(Message::from).collect())
        })
    }
}

fn query_entries(conn: &Connection, order: EntryOrder, limit: u32) -> Result<Vec<Entry>, StoreError> {
    let order_by = match order {
        EntryOrder::Rank => "rank ASC, created_at ASC, name ASC",
        EntryOrder::Created => "created_at ASC, name ASC",
    };
    let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries ORDER BY {order_by} LIMIT ?1");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([limit], entry_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows.into_iter().map(Entry::from).collect())
}

fn entry_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntryRow> {
    Ok(EntryRow {
        id: row.get(0)?,
        name: row.get(1)?,
        rank: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Single-statement upsert, so it is atomic with or without an enclosing
/// transaction.
fn increment_counter(conn: &Connection, counter_id: &str) -> Result<u64, StoreError> {
    let value: i64 = conn.query_row(
        "INSERT INTO counters (id, value) VALUES (?1, 1)
         ON CONFLICT(id) DO UPDATE SET value = value + 1
         RETURNING value",
        [counter_id],
        |row| row.get(0),
    )?;
    Ok(value as u64)
}

fn insert_entry(conn: &Connection, name: &str, rank: u64) -> Result<Entry, StoreError> {
    let row = EntryRow {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        rank: rank as i64,
        created_at: format_timestamp(Utc::now()),
    };

    let inserted = conn.execute(
        "INSERT INTO entries (id, name, rank, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![row.id, row.name, row.rank, row.created_at],
    );

    match inserted {
        Ok(_) => {
            debug!("Inserted entry '{}' at rank {}", name, rank);
            Ok(row.into())
        }
        Err(e) if is_unique_violation(&e) => Err(StoreError::Duplicate {
            key: name.to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn next_rank_is_contiguous() {
        let db = Database::open_in_memory().unwrap();

        let alice = db.write_entry_next_rank("Alice").unwrap();
        let bob = db.write_entry_next_rank("Bob").unwrap();

        assert_eq!(alice.rank, 1);
        assert_eq!(bob.rank, 2);
        assert_eq!(db.count_entries().unwrap(), 2);
    }

    #[test]
    fn duplicate_name_does_not_consume_a_rank() {
        let db = Database::open_in_memory().unwrap();

        db.write_entry_next_rank("Alice").unwrap();
        let err = db.write_entry_next_rank("Alice").unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { ref key } if key == "Alice"));

        let bob = db.write_entry_next_rank("Bob").unwrap();
        assert_eq!(bob.rank, 2);
    }

    #[test]
    fn plain_write_rejects_duplicate_and_advances_counter() {
        let db = Database::open_in_memory().unwrap();

        db.write_entry("Alice", 1).unwrap();
        assert!(matches!(
            db.write_entry("Alice", 2),
            Err(StoreError::Duplicate { .. })
        ));

        // Counter caught up with the hand-picked rank.
        assert_eq!(db.write_entry_next_rank("Bob").unwrap().rank, 2);
    }

    fn insert_at(db: &Database, name: &str, rank: i64, created_at: &str) {
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO entries (id, name, rank, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![Uuid::new_v4().to_string(), name, rank, created_at],
            )?;
            Ok(())
        })
        .unwrap();
    }

    fn names(entries: Vec<Entry>) -> Vec<String> {
        entries.into_iter().map(|e| e.name).collect()
    }

    #[test]
    fn rank_order_breaks_ties_by_time_then_name() {
        let db = Database::open_in_memory().unwrap();
        insert_at(&db, "Carol", 2, "2026-01-01T00:00:00.000000Z");
        insert_at(&db, "Dave", 1, "2026-01-01T00:00:02.000000Z");
        insert_at(&db, "Bob", 1, "2026-01-01T00:00:01.000000Z");
        insert_at(&db, "Alice", 1, "2026-01-01T00:00:01.000000Z");

        let by_rank = db.list_entries(EntryOrder::Rank, 10).unwrap();
        assert_eq!(names(by_rank), ["Alice", "Bob", "Dave", "Carol"]);

        let by_created = db.list_entries(EntryOrder::Created, 2).unwrap();
        assert_eq!(names(by_created), ["Carol", "Alice"]);
    }

    #[test]
    fn find_entry_by_name() {
        let db = Database::open_in_memory().unwrap();
        db.write_entry_next_rank("Alice").unwrap();

        assert_eq!(db.find_entry("Alice").unwrap().map(|e| e.rank), Some(1));
        assert!(db.find_entry("alice").unwrap().is_none());
    }

    #[test]
    fn counters_are_independent() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.atomic_increment_and_get("visits").unwrap(), 1);
        assert_eq!(db.atomic_increment_and_get("visits").unwrap(), 2);
        assert_eq!(db.atomic_increment_and_get("other").unwrap(), 1);
    }

    #[test]
    fn messages_newest_first_with_limit() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..5 {
            db.append_message("Alice", &format!("msg {i}")).unwrap();
        }

        let texts: Vec<String> = db
            .list_messages(3)
            .unwrap()
            .into_iter()
            .map(|m| m.message)
            .collect();
        assert_eq!(texts, ["msg 4", "msg 3", "msg 2"]);
    }

    #[test]
    fn concurrent_submissions_get_distinct_contiguous_ranks() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open(&dir.path().join("board.db")).unwrap());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let db = db.clone();
                thread::spawn(move || db.write_entry_next_rank(&format!("user{i}")).unwrap().rank)
            })
            .collect();

        let mut ranks: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        ranks.sort_unstable();
        assert_eq!(ranks, (1..=16).collect::<Vec<u64>>());
    }

    #[test]
    fn reopen_keeps_counter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.db");

        {
            let db = Database::open(&path).unwrap();
            db.write_entry_next_rank("Alice").unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.write_entry_next_rank("Bob").unwrap().rank, 2);
    }
}
