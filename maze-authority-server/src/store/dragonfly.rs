//! `Dragonfly` (Redis-compatible) store.
//!
//! Event streams are plain lists so that list index and event offset
//! coincide; a reader resumes from any offset with `LRANGE`.

use fred::prelude::*;
use fred::types::SetOptions;

use crate::game::events::EventRecord;
use crate::game::state::RoomSnapshot;
use crate::proof::receipt::Receipt;
use crate::store::{check_republish, events_key, receipt_key, snapshot_key, StoreError};

/// Key read by the readiness probe.
const PING_KEY: &str = "maze-authority:ping";

/// Connection handle to a `Dragonfly` (Redis-compatible) instance.
#[derive(Clone)]
pub struct DragonflyStore {
    client: Client,
}

impl DragonflyStore {
    /// Connect to `Dragonfly` at the given URL (`redis://host:port[/db]`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the URL cannot be parsed.
    /// Returns [`StoreError::Dragonfly`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let config = Config::from_url(url)
            .map_err(|e| StoreError::Config(format!("Invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!("Connected to Dragonfly");
        Ok(Self { client })
    }

    pub(crate) async fn publish_event(&self, room_id: &str, record: &EventRecord) -> Result<(), StoreError> {
        let key = events_key(room_id);
        let stored: u64 = self.client.llen(&key).await?;
        if record.offset < stored {
            let index = i64::try_from(record.offset).unwrap_or(i64::MAX);
            let existing: Option<String> = self.client.lindex(&key, index).await?;
            let existing: Option<EventRecord> = existing.map(|s| serde_json::from_str(&s)).transpose()?;
            return check_republish(room_id, existing.as_ref(), record);
        }
        if record.offset > stored {
            return Err(StoreError::OutOfOrder {
                room_id: room_id.to_string(),
                expected: stored,
                got: record.offset,
            });
        }
        let json = serde_json::to_string(record)?;
        // LLEN and RPUSH are separate round trips; the new length shows
        // whether another writer got in between.
        let length: u64 = self.client.rpush(&key, json.as_str()).await?;
        if length != record.offset + 1 {
            return Err(StoreError::Conflict {
                room_id: room_id.to_string(),
                offset: record.offset,
            });
        }
        Ok(())
    }

    pub(crate) async fn read_events(&self, room_id: &str, from: u64, limit: usize) -> Result<Vec<EventRecord>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let key = events_key(room_id);
        let start = i64::try_from(from).unwrap_or(i64::MAX);
        let stop = start.saturating_add(limit as i64 - 1);
        let values: Vec<String> = self.client.lrange(&key, start, stop).await?;
        values
            .iter()
            .map(|s| serde_json::from_str(s).map_err(StoreError::from))
            .collect()
    }

    pub(crate) async fn event_count(&self, room_id: &str) -> Result<u64, StoreError> {
        let count: u64 = self.client.llen(events_key(room_id)).await?;
        Ok(count)
    }

    pub(crate) async fn save_snapshot(&self, snapshot: &RoomSnapshot) -> Result<(), StoreError> {
        let key = snapshot_key(&snapshot.room_id, &snapshot.incarnation, snapshot.tick);
        let json = serde_json::to_string(snapshot)?;
        let _: Option<String> = self
            .client
            .set(key, json.as_str(), None, Some(SetOptions::NX), false)
            .await?;
        Ok(())
    }

    pub(crate) async fn save_receipt(&self, receipt: &Receipt) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let json = serde_json::to_string(receipt)?;
        let _: () = self.client.set(receipt_key(&id), json.as_str(), None, None, false).await?;
        Ok(id)
    }

    pub(crate) async fn ping(&self) -> Result<(), StoreError> {
        let _: Option<String> = self.client.get(PING_KEY).await?;
        Ok(())
    }
}
