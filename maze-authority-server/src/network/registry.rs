//! Room Registry
//!
//! Owns every live room. Rooms are partitioned into shards by a stable hash
//! of the room id and each shard has its own lock, so lookups for unrelated
//! rooms never contend. Rooms never interact, so nothing crosses shards.
//!
//! A stopped room leaves its log behind in the shard until everything it
//! admitted has been stored, so a room recreated under the same id keeps
//! appending to one gap-free stream.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::core::hash::{derive_seed, shard_for};
use crate::game::tick::RoomConfig;
use crate::network::room::{RoomOpenError, RoomSession};
use crate::proof::receipt::ReceiptIssuer;
use crate::store::{EventLog, LogSuccession, Store};

/// Shared handle to one room.
pub type RoomHandle = Arc<RwLock<RoomSession>>;

#[derive(Default)]
struct ShardRooms {
    live: BTreeMap<String, RoomHandle>,
    retired: BTreeMap<String, LogSuccession>,
}

impl ShardRooms {
    fn stop(&mut self, room_id: &str, room: &mut RoomSession) {
        if let Some(succession) = room.stop() {
            self.retired.insert(room_id.to_string(), succession);
        }
    }
}

type Shard = RwLock<ShardRooms>;

/// Registry of live rooms.
pub struct RoomRegistry {
    shards: Vec<Shard>,
    room_config: RoomConfig,
    seed_salt: String,
    store: Store,
    issuer: ReceiptIssuer,
}

impl RoomRegistry {
    /// Create an empty registry with `shard_count` shards (at least one).
    pub fn new(
        shard_count: usize,
        room_config: RoomConfig,
        seed_salt: impl Into<String>,
        store: Store,
        issuer: ReceiptIssuer,
    ) -> Self {
        let shards = (0..shard_count.max(1)).map(|_| RwLock::new(ShardRooms::default())).collect();
        Self {
            shards,
            room_config,
            seed_salt: seed_salt.into(),
            store,
            issuer,
        }
    }

    fn shard(&self, room_id: &str) -> &Shard {
        &self.shards[shard_for(room_id, self.shards.len())]
    }

    /// Seed a room id gets in `mode`.
    pub fn seed_for(&self, mode: &str, room_id: &str) -> String {
        derive_seed(mode, &self.seed_salt, room_id)
    }

    /// Look up a room.
    pub async fn get(&self, room_id: &str) -> Option<RoomHandle> {
        self.shard(room_id).read().await.live.get(room_id).cloned()
    }

    /// Look up a room, building it from its derived seed if unknown.
    ///
    /// A new room continues the event stream of the room id: from a
    /// retired log still held here, or else after the records already in
    /// the store.
    pub async fn get_or_create(&self, room_id: &str, mode: &str) -> Result<RoomHandle, RoomOpenError> {
        if let Some(room) = self.get(room_id).await {
            return Ok(room);
        }

        let mut shard = self.shard(room_id).write().await;
        // Another connection may have created it while we waited.
        if let Some(room) = shard.live.get(room_id) {
            return Ok(Arc::clone(room));
        }

        let log = match shard.retired.remove(room_id) {
            Some(succession) => {
                debug!(room_id, offset = succession.next_offset(), "room resumes retired log");
                EventLog::succeed(succession, self.store.clone())
            }
            None => EventLog::open(room_id, self.store.clone()).await?,
        };
        let seed = self.seed_for(mode, room_id);
        let session = RoomSession::with_log(
            seed.clone(),
            self.room_config.clone(),
            log,
            self.store.clone(),
            self.issuer.clone(),
        )?;
        let room = Arc::new(RwLock::new(session));
        shard.live.insert(room_id.to_string(), Arc::clone(&room));

        info!(room_id, mode, seed = %seed, "room created");
        Ok(room)
    }

    /// Remove and stop a room.
    pub async fn remove(&self, room_id: &str) -> Option<RoomHandle> {
        let mut shard = self.shard(room_id).write().await;
        let room = shard.live.remove(room_id)?;
        shard.stop(room_id, &mut *room.write().await);
        Some(room)
    }

    /// Stop and remove every room that has had no connections for `timeout`.
    ///
    /// Returns the evicted room ids.
    pub async fn evict_idle(&self, timeout: Duration) -> Vec<String> {
        let now = Instant::now();
        let mut evicted = Vec::new();

        for shard in &self.shards {
            let mut rooms = shard.write().await;
            let mut expired = Vec::new();
            rooms.retired.retain(|_, succession| !succession.is_drained());
            for (id, room) in rooms.live.iter() {
                let idle = room.read().await.idle_for(now);
                if idle.is_some_and(|d| d >= timeout) {
                    expired.push(id.clone());
                }
            }
            for id in expired {
                if let Some(room) = rooms.live.remove(&id) {
                    rooms.stop(&id, &mut *room.write().await);
                    info!(room_id = %id, "idle room evicted");
                    evicted.push(id);
                }
            }
        }

        evicted
    }

    /// Number of live rooms.
    pub async fn room_count(&self) -> usize {
        let mut count = 0;
        for shard in &self.shards {
            count += shard.read().await.live.len();
        }
        count
    }

    /// Open connections across all rooms.
    pub async fn connection_count(&self) -> usize {
        let mut count = 0;
        for shard in &self.shards {
            let rooms: Vec<RoomHandle> = shard.read().await.live.values().cloned().collect();
            for room in rooms {
                count += room.read().await.connection_count();
            }
        }
        count
    }

    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Store shared by all rooms.
    pub fn store(&self) -> &Store {
        &self.store
    }
}
