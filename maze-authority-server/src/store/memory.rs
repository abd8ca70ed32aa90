//! In-process store.
//!
//! Same semantics as the `Dragonfly` backend, held in memory. An
//! availability switch lets tests simulate an outage.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::game::events::EventRecord;
use crate::game::state::RoomSnapshot;
use crate::proof::receipt::Receipt;
use crate::store::{check_republish, StoreError};

#[derive(Default)]
struct Inner {
    events: RwLock<HashMap<String, Vec<EventRecord>>>,
    snapshots: RwLock<BTreeMap<(String, String, u64), RoomSnapshot>>,
    receipts: RwLock<HashMap<String, Receipt>>,
    unavailable: AtomicBool,
}

/// Memory-backed store. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage (`false`) or recovery (`true`).
    pub fn set_available(&self, available: bool) {
        self.inner.unavailable.store(!available, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".into()));
        }
        Ok(())
    }

    pub(crate) async fn publish_event(&self, room_id: &str, record: &EventRecord) -> Result<(), StoreError> {
        self.check()?;
        let mut events = self.inner.events.write().await;
        let stream = events.entry(room_id.to_string()).or_default();
        let expected = stream.len() as u64;
        if record.offset < expected {
            let stored = usize::try_from(record.offset).ok().and_then(|i| stream.get(i));
            return check_republish(room_id, stored, record);
        }
        if record.offset > expected {
            return Err(StoreError::OutOfOrder {
                room_id: room_id.to_string(),
                expected,
                got: record.offset,
            });
        }
        stream.push(record.clone());
        Ok(())
    }

    pub(crate) async fn read_events(&self, room_id: &str, from: u64, limit: usize) -> Result<Vec<EventRecord>, StoreError> {
        self.check()?;
        let events = self.inner.events.read().await;
        let records = events
            .get(room_id)
            .map(|stream| stream.iter().skip(from as usize).take(limit).cloned().collect())
            .unwrap_or_default();
        Ok(records)
    }

    pub(crate) async fn event_count(&self, room_id: &str) -> Result<u64, StoreError> {
        self.check()?;
        let events = self.inner.events.read().await;
        Ok(events.get(room_id).map_or(0, |s| s.len() as u64))
    }

    pub(crate) async fn save_snapshot(&self, snapshot: &RoomSnapshot) -> Result<(), StoreError> {
        self.check()?;
        let key = (snapshot.room_id.clone(), snapshot.incarnation.clone(), snapshot.tick);
        self.inner.snapshots.write().await.entry(key).or_insert_with(|| snapshot.clone());
        Ok(())
    }

    pub(crate) async fn save_receipt(&self, receipt: &Receipt) -> Result<String, StoreError> {
        self.check()?;
        let id = uuid::Uuid::new_v4().to_string();
        self.inner.receipts.write().await.insert(id.clone(), receipt.clone());
        Ok(id)
    }

    pub(crate) fn ping(&self) -> Result<(), StoreError> {
        self.check()
    }

    /// Ticks of every snapshot stored for a room, grouped by incarnation.
    pub async fn snapshot_ticks(&self, room_id: &str) -> Vec<u64> {
        self.inner
            .snapshots
            .read()
            .await
            .keys()
            .filter(|(room, _, _)| room == room_id)
            .map(|(_, _, tick)| *tick)
            .collect()
    }

    /// Look up a stored receipt.
    pub async fn receipt(&self, receipt_id: &str) -> Option<Receipt> {
        self.inner.receipts.read().await.get(receipt_id).cloned()
    }

    /// Number of stored receipts.
    pub async fn receipt_count(&self) -> usize {
        self.inner.receipts.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::EventKind;
    use serde_json::json;

    fn record(offset: u64) -> EventRecord {
        EventRecord {
            offset,
            ts: 0,
            tick: offset,
            kind: EventKind::Pickup,
            who: "p".into(),
            payload: json!({}),
        }
    }

    #[tokio::test]
    async fn test_publish_is_idempotent_and_ordered() {
        let store = MemoryStore::new();
        store.publish_event("r", &record(0)).await.unwrap();
        store.publish_event("r", &record(1)).await.unwrap();
        // Retried publish of an already-stored offset is a no-op.
        store.publish_event("r", &record(1)).await.unwrap();
        assert_eq!(store.event_count("r").await.unwrap(), 2);

        let err = store.publish_event("r", &record(5)).await.unwrap_err();
        assert!(matches!(err, StoreError::OutOfOrder { expected: 2, got: 5, .. }));
    }

    #[tokio::test]
    async fn test_different_record_at_taken_offset_conflicts() {
        let store = MemoryStore::new();
        store.publish_event("r", &record(0)).await.unwrap();
        store.publish_event("r", &record(1)).await.unwrap();

        let imposter = EventRecord { tick: 100, ..record(1) };
        let err = store.publish_event("r", &imposter).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { offset: 1, .. }));

        let stored = store.read_events("r", 0, 10).await.unwrap();
        assert_eq!(stored, vec![record(0), record(1)]);
    }

    #[tokio::test]
    async fn test_snapshots_are_insert_only_per_incarnation() {
        let store = MemoryStore::new();
        let maze_state = crate::game::state::RoomState::new(
            "r",
            "abc123",
            &crate::game::tick::RoomConfig::default(),
        )
        .unwrap();
        let first = maze_state.snapshot("one");
        store.save_snapshot(&first).await.unwrap();
        store.save_snapshot(&maze_state.snapshot("two")).await.unwrap();
        assert_eq!(store.snapshot_ticks("r").await, vec![0, 0]);

        let mut later = first.clone();
        later.rng_state ^= 1;
        store.save_snapshot(&later).await.unwrap();
        let kept = store.inner.snapshots.read().await[&("r".to_string(), "one".to_string(), 0)].clone();
        assert_eq!(kept, first);
    }

    #[tokio::test]
    async fn test_read_window() {
        let store = MemoryStore::new();
        for i in 0..10 {
            store.publish_event("r", &record(i)).await.unwrap();
        }
        let window = store.read_events("r", 3, 4).await.unwrap();
        let offsets: Vec<u64> = window.iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![3, 4, 5, 6]);
        assert!(store.read_events("r", 50, 4).await.unwrap().is_empty());
        assert!(store.read_events("other", 0, 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_outage_switch() {
        let store = MemoryStore::new();
        store.set_available(false);
        assert!(store.ping().is_err());
        assert!(matches!(
            store.publish_event("r", &record(0)).await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_available(true);
        assert!(store.ping().is_ok());
        store.publish_event("r", &record(0)).await.unwrap();
    }
}
