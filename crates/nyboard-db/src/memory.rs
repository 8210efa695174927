use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use uuid::Uuid;

use nyboard_types::api::EntryOrder;
use nyboard_types::models::{Entry, Message};

use crate::store::{BoardStore, ENTRY_COUNTER, StoreError};

/// Process-local store. Nothing survives a restart; used for tests and for
/// running the server with `NYBOARD_DB_PATH=:memory:`.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    entries: Vec<Entry>,
    /// Insertion order; newest last.
    messages: Vec<Message>,
    counters: HashMap<String, u64>,
}

impl MemoryInner {
    fn insert_entry(&mut self, name: &str, rank: u64) -> Result<Entry, StoreError> {
        if self.entries.iter().any(|e| e.name == name) {
            return Err(StoreError::Duplicate {
                key: name.to_string(),
            });
        }

        let entry = Entry {
            id: Uuid::new_v4(),
            name: name.to_string(),
            rank,
            created_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    fn increment(&mut self, counter_id: &str) -> u64 {
        let value = self.counters.entry(counter_id.to_string()).or_default();
        *value += 1;
        *value
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>, StoreError> {
        self.inner
            .lock()
            .map_err(|e| anyhow::anyhow!("memory store lock poisoned: {}", e).into())
    }
}

impl BoardStore for MemoryStore {
    fn count_entries(&self) -> Result<u64, StoreError> {
        Ok(self.lock()?.entries.len() as u64)
    }

    fn list_entries(&self, order: EntryOrder, limit: u32) -> Result<Vec<Entry>, StoreError> {
        let mut entries = self.lock()?.entries.clone();
        match order {
            EntryOrder::Rank => entries.sort_by(|a, b| {
                (a.rank, a.created_at, &a.name).cmp(&(b.rank, b.created_at, &b.name))
            }),
            EntryOrder::Created => {
                entries.sort_by(|a, b| (a.created_at, &a.name).cmp(&(b.created_at, &b.name)))
            }
        }
        entries.truncate(limit as usize);
        Ok(entries)
    }

    fn find_entry(&self, name: &str) -> Result<Option<Entry>, StoreError> {
        Ok(self.lock()?.entries.iter().find(|e| e.name == name).cloned())
    }

    fn write_entry(&self, name: &str, rank: u64) -> Result<Entry, StoreError> {
        let mut inner = self.lock()?;
        let entry = inner.insert_entry(name, rank)?;
        let counter = inner.counters.entry(ENTRY_COUNTER.to_string()).or_default();
        *counter = (*counter).max(rank);
        Ok(entry)
    }

    fn write_entry_next_rank(&self, name: &str) -> Result<Entry, StoreError> {
        let mut inner = self.lock()?;
        if inner.entries.iter().any(|e| e.name == name) {
            return Err(StoreError::Duplicate {
                key: name.to_string(),
            });
        }
        let rank = inner.increment(ENTRY_COUNTER);
        inner.insert_entry(name, rank)
    }

    fn atomic_increment_and_get(&self, counter_id: &str) -> Result<u64, StoreError> {
        Ok(self.lock()?.increment(counter_id))
    }

    fn append_message(&self, name: &str, message: &str) -> Result<Message, StoreError> {
        let message = Message {
            id: Uuid::new_v4(),
            name: name.to_string(),
            message: message.to_string(),
            created_at: Utc::now(),
        };
        self.lock()?.messages.push(message.clone());
        Ok(message)
    }

    fn list_messages(&self, limit: u32) -> Result<Vec<Message>, StoreError> {
        let mut messages: Vec<Message> = self.lock()?.messages.iter().rev().cloned().collect();
        // Stable sort keeps insertion order (newest first) among equal timestamps.
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        messages.truncate(limit as usize);
        Ok(messages)
    }
}
