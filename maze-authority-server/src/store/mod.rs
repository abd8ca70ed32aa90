//! Persistence Collaborators
//!
//! The durable side of a room: the per-room event stream, periodic
//! snapshots and issued receipts. Everything here is best-effort from the
//! simulation's point of view; rooms keep ticking when the store is down.
//!
//! ## Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `match:{room}:events` | List | Event records, list index = offset |
//! | `room:{room}:snapshot:{incarnation}:{tick}` | JSON | Full room snapshot |
//! | `receipt:{id}` | JSON | Issued receipt |

pub mod dragonfly;
pub mod log;
pub mod memory;

use thiserror::Error;

use crate::game::events::EventRecord;
use crate::game::state::RoomSnapshot;
use crate::proof::receipt::Receipt;

pub use dragonfly::DragonflyStore;
pub use log::{EventLog, EventTail, LogStatus, LogSuccession};
pub use memory::MemoryStore;

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend refused or could not be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A `Dragonfly`/Redis operation failed
    #[error("dragonfly error: {0}")]
    Dragonfly(#[from] fred::error::Error),

    /// A serialization or deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Publishing an offset that would leave a gap in the stream
    #[error("out-of-order publish for room {room_id}: expected offset {expected}, got {got}")]
    OutOfOrder {
        /// Room
        room_id: String,
        /// Next offset the stream can accept
        expected: u64,
        /// Offset offered
        got: u64,
    },

    /// A different record is already stored at this offset
    #[error("conflicting record for room {room_id} at offset {offset}")]
    Conflict {
        /// Room
        room_id: String,
        /// Offset already taken
        offset: u64,
    },

    /// The outbox is full; the event was not admitted
    #[error("event log backlog full for room {room_id} ({capacity} records)")]
    Backlog {
        /// Room
        room_id: String,
        /// Outbox capacity
        capacity: usize,
    },

    /// The event log for this room has been shut down
    #[error("event log closed for room {0}")]
    Closed(String),

    /// Bad connection settings
    #[error("configuration error: {0}")]
    Config(String),
}

/// Key of a room's event list.
pub fn events_key(room_id: &str) -> String {
    format!("match:{room_id}:events")
}

/// Key of one room snapshot.
pub fn snapshot_key(room_id: &str, incarnation: &str, tick: u64) -> String {
    format!("room:{room_id}:snapshot:{incarnation}:{tick}")
}

/// Accept a re-published record only if it is the one already stored.
pub(crate) fn check_republish(
    room_id: &str,
    stored: Option<&EventRecord>,
    offered: &EventRecord,
) -> Result<(), StoreError> {
    match stored {
        Some(existing) if existing == offered => Ok(()),
        _ => Err(StoreError::Conflict {
            room_id: room_id.to_string(),
            offset: offered.offset,
        }),
    }
}

/// Key of one receipt.
pub fn receipt_key(receipt_id: &str) -> String {
    format!("receipt:{receipt_id}")
}

/// Durable store shared by all rooms.
///
/// Rooms never share keys, and every write is an append or insert.
#[derive(Clone)]
pub enum Store {
    /// Process-local store (development and tests)
    Memory(MemoryStore),
    /// `Dragonfly`/Redis-backed store
    Dragonfly(DragonflyStore),
}

impl Store {
    /// Fresh in-memory store.
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::new())
    }

    /// Connect to `Dragonfly` at `url`.
    pub async fn dragonfly(url: &str) -> Result<Self, StoreError> {
        Ok(Self::Dragonfly(DragonflyStore::connect(url).await?))
    }

    /// Backend name, for logs and metrics.
    pub fn backend(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Dragonfly(_) => "dragonfly",
        }
    }

    /// Append `record` to its room's stream.
    ///
    /// Idempotent: re-publishing the record already stored at its offset is
    /// a no-op, so a retried publish never duplicates. A different record at
    /// a taken offset is a [`StoreError::Conflict`] and is never written.
    pub async fn publish_event(&self, room_id: &str, record: &EventRecord) -> Result<(), StoreError> {
        match self {
            Self::Memory(s) => s.publish_event(room_id, record).await,
            Self::Dragonfly(s) => s.publish_event(room_id, record).await,
        }
    }

    /// Up to `limit` records starting at offset `from`.
    pub async fn read_events(&self, room_id: &str, from: u64, limit: usize) -> Result<Vec<EventRecord>, StoreError> {
        match self {
            Self::Memory(s) => s.read_events(room_id, from, limit).await,
            Self::Dragonfly(s) => s.read_events(room_id, from, limit).await,
        }
    }

    /// Number of records stored for a room.
    pub async fn event_count(&self, room_id: &str) -> Result<u64, StoreError> {
        match self {
            Self::Memory(s) => s.event_count(room_id).await,
            Self::Dragonfly(s) => s.event_count(room_id).await,
        }
    }

    /// Persist a room snapshot.
    pub async fn save_snapshot(&self, snapshot: &RoomSnapshot) -> Result<(), StoreError> {
        match self {
            Self::Memory(s) => s.save_snapshot(snapshot).await,
            Self::Dragonfly(s) => s.save_snapshot(snapshot).await,
        }
    }

    /// Persist a receipt under a fresh id and return the id.
    pub async fn save_receipt(&self, receipt: &Receipt) -> Result<String, StoreError> {
        match self {
            Self::Memory(s) => s.save_receipt(receipt).await,
            Self::Dragonfly(s) => s.save_receipt(receipt).await,
        }
    }

    /// Check the backend is reachable.
    pub async fn ping(&self) -> Result<(), StoreError> {
        match self {
            Self::Memory(s) => s.ping(),
            Self::Dragonfly(s) => s.ping().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_patterns() {
        assert_eq!(events_key("r1"), "match:r1:events");
        assert_eq!(snapshot_key("r1", "a1", 100), "room:r1:snapshot:a1:100");
        assert_eq!(receipt_key("abc"), "receipt:abc");
    }

    #[test]
    fn test_backend_names() {
        assert_eq!(Store::memory().backend(), "memory");
    }
}
