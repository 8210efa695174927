use nyboard_types::api::EntryOrder;
use nyboard_types::models::{Entry, Message};
use thiserror::Error;

/// Counter that hands out entry ranks.
pub const ENTRY_COUNTER: &str = "entries";

#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with this unique key already exists; nothing was written.
    #[error("duplicate key: {key}")]
    Duplicate { key: String },
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Backend(err.into())
    }
}

/// Storage capability the board services depend on.
///
/// Calls are blocking. Every write is a single atomic unit: it either lands
/// completely or leaves the store untouched.
pub trait BoardStore: Send + Sync {
    fn count_entries(&self) -> Result<u64, StoreError>;

    /// At most `limit` entries in the given order.
    fn list_entries(&self, order: EntryOrder, limit: u32) -> Result<Vec<Entry>, StoreError>;

    fn find_entry(&self, name: &str) -> Result<Option<Entry>, StoreError>;

    /// Write an entry with a caller-chosen rank, unique on `name`.
    fn write_entry(&self, name: &str, rank: u64) -> Result<Entry, StoreError>;

    /// Bump [`ENTRY_COUNTER`] and write an entry holding the new value, as one
    /// unit. A duplicate name leaves the counter where it was.
    fn write_entry_next_rank(&self, name: &str) -> Result<Entry, StoreError>;

    fn atomic_increment_and_get(&self, counter_id: &str) -> Result<u64, StoreError>;

    fn append_message(&self, name: &str, message: &str) -> Result<Message, StoreError>;

    /// At most `limit` messages, newest first.
    fn list_messages(&self, limit: u32) -> Result<Vec<Message>, StoreError>;
}
