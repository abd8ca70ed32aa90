//! Room Session
//!
//! One live room: the simulated world, the connections attached to it and
//! its event log. The world owns player records; connection handles live
//! in a side table keyed by player id and never inside the records.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::game::events::{FinishRecord, GameEvent};
use crate::game::input::{apply_input, InputCommand, InputOutcome};
use crate::game::maze::MazeError;
use crate::game::state::{PlayerId, RoomState};
use crate::game::tick::{tick, RoomConfig, TickResult};
use crate::network::protocol::{InitMessage, ServerMessage, StateFrame};
use crate::proof::receipt::{ReceiptClaim, ReceiptIssuer};
use crate::store::{EventLog, LogStatus, LogSuccession, Store, StoreError};

/// Per-connection outbound queue depth.
pub const CLIENT_QUEUE_DEPTH: usize = 64;

// =============================================================================
// STATUS & ERRORS
// =============================================================================

/// Lifecycle of a room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// Created, no client has attached yet.
    Uninitialized,
    /// Ticking.
    Running,
    /// Stopped by eviction; rejects attaches.
    Stopped,
}

/// Errors from room operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// Input names a player that is not in the room.
    #[error("player {0} is not in this room")]
    UnknownPlayer(PlayerId),

    /// Input arrived on a connection that a newer one replaced.
    #[error("connection {conn_id} of player {player_id} was superseded")]
    StaleConnection {
        /// Player
        player_id: PlayerId,
        /// Connection the input came from
        conn_id: u64,
    },

    /// The room has been stopped.
    #[error("room {0} is stopped")]
    Stopped(String),
}

/// Errors from opening a room.
#[derive(Debug, thiserror::Error)]
pub enum RoomOpenError {
    /// The seed does not produce a usable maze.
    #[error(transparent)]
    Maze(#[from] MazeError),

    /// The room's event stream could not be located in the store.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RoomError {
    /// Whether the error counts against the connection's violation budget.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::UnknownPlayer(_) | Self::StaleConnection { .. })
    }
}

// =============================================================================
// CONNECTIONS
// =============================================================================

/// Side-table entry for one attached connection.
struct ClientHandle {
    conn_id: u64,
    sender: mpsc::Sender<ServerMessage>,
}

/// Returned by [`RoomSession::attach`].
#[derive(Debug, Clone)]
pub struct Attached {
    /// Identifier of the new connection within the room
    pub conn_id: u64,
    /// INIT already queued to the connection
    pub init: InitMessage,
    /// Whether this attach moved the room to Running
    pub started: bool,
}

/// Summary served by the room inspection endpoint.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    /// Room identifier
    pub room_id: String,
    /// Identifier of this instance of the room
    pub incarnation: String,
    /// Room seed
    pub seed: String,
    /// Maze layout hash
    pub layout_hash: String,
    /// Lifecycle state
    pub status: RoomStatus,
    /// Current tick
    pub tick: u64,
    /// Players currently in the room
    pub players: Vec<PlayerId>,
    /// Open connections
    pub connections: usize,
    /// Event log offsets and health
    pub log: LogStatus,
}

// =============================================================================
// ROOM SESSION
// =============================================================================

/// A room: world state, connections and event log.
pub struct RoomSession {
    state: RoomState,
    incarnation: String,
    config: RoomConfig,
    status: RoomStatus,
    log: EventLog,
    store: Store,
    issuer: ReceiptIssuer,
    clients: BTreeMap<PlayerId, ClientHandle>,
    next_conn_id: u64,
    idle_since: Option<Instant>,
}

impl RoomSession {
    /// Build a room from its seed with a log that continues the room's
    /// stored event stream.
    ///
    /// Spawns the event log drain, so must be called inside a Tokio runtime.
    pub async fn open(
        room_id: impl Into<String>,
        seed: impl Into<String>,
        config: RoomConfig,
        store: Store,
        issuer: ReceiptIssuer,
    ) -> Result<Self, RoomOpenError> {
        let log = EventLog::open(room_id, store.clone()).await?;
        Ok(Self::with_log(seed, config, log, store, issuer)?)
    }

    /// Build a room around an already opened log. The room takes the
    /// log's room id.
    pub fn with_log(
        seed: impl Into<String>,
        config: RoomConfig,
        log: EventLog,
        store: Store,
        issuer: ReceiptIssuer,
    ) -> Result<Self, MazeError> {
        let state = RoomState::new(log.room_id(), seed, &config)?;

        Ok(Self {
            state,
            incarnation: uuid::Uuid::new_v4().to_string(),
            config,
            status: RoomStatus::Uninitialized,
            log,
            store,
            issuer,
            clients: BTreeMap::new(),
            next_conn_id: 1,
            idle_since: Some(Instant::now()),
        })
    }

    /// Attach a connection for `player_id`.
    ///
    /// The player is (re)spawned fresh at the start cell, a Spawn event is
    /// logged and INIT is queued on `sender`. A previous connection of the
    /// same player is dropped from the side table, which closes it.
    pub fn attach(
        &mut self,
        player_id: PlayerId,
        sender: mpsc::Sender<ServerMessage>,
        now_ms: i64,
    ) -> Result<Attached, RoomError> {
        if self.status == RoomStatus::Stopped {
            return Err(RoomError::Stopped(self.state.room_id.clone()));
        }

        self.state.add_player(player_id.clone(), now_ms);
        self.append(GameEvent::spawn(self.state.tick, &player_id), now_ms);

        let init = InitMessage::for_room(
            &self.state,
            player_id.clone(),
            self.config.map_version,
            self.config.tick_rate,
            now_ms,
        );
        if sender.try_send(ServerMessage::Init(init.clone())).is_err() {
            debug!(room_id = %self.state.room_id, player_id = %player_id, "INIT not queued, connection already gone");
        }

        let conn_id = self.next_conn_id;
        self.next_conn_id += 1;
        if let Some(old) = self.clients.insert(player_id.clone(), ClientHandle { conn_id, sender }) {
            info!(room_id = %self.state.room_id, player_id = %player_id, old_conn = old.conn_id, "connection superseded");
        }
        self.idle_since = None;

        let started = self.status == RoomStatus::Uninitialized;
        if started {
            self.status = RoomStatus::Running;
            info!(room_id = %self.state.room_id, seed = %self.state.seed, "room running");
        }

        Ok(Attached { conn_id, init, started })
    }

    /// Detach connection `conn_id` of `player_id`.
    ///
    /// Does nothing if the player has since reconnected on a newer
    /// connection. Returns whether anything was removed.
    pub fn detach(&mut self, player_id: &PlayerId, conn_id: u64) -> bool {
        match self.clients.get(player_id) {
            Some(handle) if handle.conn_id == conn_id => {}
            _ => return false,
        }
        self.clients.remove(player_id);
        self.state.remove_player(player_id);
        if self.clients.is_empty() {
            self.idle_since = Some(Instant::now());
        }
        debug!(room_id = %self.state.room_id, player_id = %player_id, conn_id, "player detached");
        true
    }

    /// Apply an input from connection `conn_id` immediately.
    pub fn handle_input(
        &mut self,
        player_id: &PlayerId,
        conn_id: u64,
        cmd: &InputCommand,
        now_ms: i64,
    ) -> Result<InputOutcome, RoomError> {
        match self.clients.get(player_id) {
            Some(handle) if handle.conn_id == conn_id => {}
            Some(_) => {
                return Err(RoomError::StaleConnection { player_id: player_id.clone(), conn_id });
            }
            None => return Err(RoomError::UnknownPlayer(player_id.clone())),
        }
        let player = self
            .state
            .get_player_mut(player_id)
            .ok_or_else(|| RoomError::UnknownPlayer(player_id.clone()))?;

        Ok(apply_input(player, cmd, &self.config, now_ms))
    }

    /// Run one tick and fan out its results.
    ///
    /// Events are admitted to the log, first finishes get a receipt, one
    /// STATE frame goes to every open connection, and a snapshot is written
    /// when due. Store work runs in the background and never blocks the tick.
    pub fn run_tick(&mut self, now_ms: i64) -> Option<TickResult> {
        if self.status != RoomStatus::Running {
            return None;
        }

        let result = tick(&mut self.state, &self.config);

        for event in &result.events {
            self.append(event.clone(), now_ms);
        }
        for finish in &result.finishes {
            self.issue_receipt(finish);
        }

        let frame = StateFrame::from_room(&self.state, self.log.emitted_offset(), now_ms);
        self.broadcast(ServerMessage::State(frame));

        if result.snapshot_due {
            self.save_snapshot();
        }

        Some(result)
    }

    /// Queue `message` on every open connection without waiting.
    ///
    /// A full or closed queue skips that connection; nothing is buffered
    /// for later.
    pub fn broadcast(&self, message: ServerMessage) {
        for (player_id, handle) in &self.clients {
            match handle.sender.try_send(message.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    debug!(room_id = %self.state.room_id, player_id = %player_id, "client lagging, frame skipped");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(room_id = %self.state.room_id, player_id = %player_id, "client closed, frame skipped");
                }
            }
        }
    }

    /// Stop the room. Drops every connection handle and retires the log.
    ///
    /// The returned succession carries the log position to the next room
    /// built under the same id. `None` if the room was already stopped.
    pub fn stop(&mut self) -> Option<LogSuccession> {
        if self.status == RoomStatus::Stopped {
            return None;
        }
        self.status = RoomStatus::Stopped;
        self.clients.clear();
        info!(
            room_id = %self.state.room_id,
            incarnation = %self.incarnation,
            tick = self.state.tick,
            log = ?self.log.status(),
            "room stopped"
        );
        self.log.retire()
    }

    fn append(&mut self, event: GameEvent, now_ms: i64) {
        let kind = event.kind;
        if let Err(e) = self.log.append(event, now_ms) {
            warn!(room_id = %self.state.room_id, ?kind, error = %e, "event not admitted to log");
        }
    }

    fn issue_receipt(&self, finish: &FinishRecord) {
        let claim = ReceiptClaim {
            room_id: self.state.room_id.clone(),
            player_id: finish.player_id.to_string(),
            seed: self.state.seed.clone(),
            time_ms: finish.time_ms.into(),
            path_hash: finish.path_hash.clone(),
        };
        let issuer = self.issuer.clone();
        tokio::spawn(async move {
            let issued = issuer.issue(claim).await;
            info!(
                room_id = %issued.receipt.claim.room_id,
                player_id = %issued.receipt.claim.player_id,
                time_ms = %issued.receipt.claim.time_ms,
                receipt_id = ?issued.receipt_id,
                "finish receipt issued"
            );
        });
    }

    fn save_snapshot(&self) {
        let snapshot = self.state.snapshot(&self.incarnation);
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.save_snapshot(&snapshot).await {
                warn!(room_id = %snapshot.room_id, tick = snapshot.tick, error = %e, "snapshot not persisted");
            }
        });
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Room identifier.
    pub fn room_id(&self) -> &str {
        &self.state.room_id
    }

    /// Identifier of this instance of the room.
    pub fn incarnation(&self) -> &str {
        &self.incarnation
    }

    /// Lifecycle state.
    pub fn status(&self) -> RoomStatus {
        self.status
    }

    /// World state.
    pub fn state(&self) -> &RoomState {
        &self.state
    }

    /// Simulation settings.
    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Event log offsets and health.
    pub fn log_status(&self) -> LogStatus {
        self.log.status()
    }

    /// Open connections.
    pub fn connection_count(&self) -> usize {
        self.clients.len()
    }

    /// How long the room has had no connections, if it has none.
    pub fn idle_for(&self, now: Instant) -> Option<Duration> {
        self.idle_since.map(|since| now.saturating_duration_since(since))
    }

    /// Inspection summary.
    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.state.room_id.clone(),
            incarnation: self.incarnation.clone(),
            seed: self.state.seed.clone(),
            layout_hash: self.state.layout_hash.clone(),
            status: self.status,
            tick: self.state.tick,
            players: self.state.players.keys().cloned().collect(),
            connections: self.clients.len(),
            log: self.log.status(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::EventKind;
    use crate::game::input::Action;
    use crate::game::maze::{Coord, Direction, Maze};
    use crate::store::MemoryStore;
    use tokio::time::sleep;

    async fn session_with(store: Store) -> RoomSession {
        let issuer = ReceiptIssuer::new(b"salt", store.clone()).unwrap();
        RoomSession::open("room-1", "abc123", RoomConfig::default(), store, issuer)
            .await
            .unwrap()
    }

    async fn session() -> RoomSession {
        session_with(Store::memory()).await
    }

    fn channel() -> (mpsc::Sender<ServerMessage>, mpsc::Receiver<ServerMessage>) {
        mpsc::channel(CLIENT_QUEUE_DEPTH)
    }

    fn alice() -> PlayerId {
        PlayerId::from("alice")
    }

    async fn wait_for_events(store: &Store, room: &str, count: u64) -> Vec<crate::game::events::EventRecord> {
        for _ in 0..200 {
            if store.event_count(room).await.unwrap() >= count {
                return store.read_events(room, 0, 100).await.unwrap();
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("events never reached {count}");
    }

    #[tokio::test]
    async fn test_attach_sends_init_and_starts_room() {
        let mut room = session().await;
        assert_eq!(room.status(), RoomStatus::Uninitialized);
        assert!(room.run_tick(0).is_none());

        let (tx, mut rx) = channel();
        let attached = room.attach(alice(), tx, 1000).unwrap();
        assert!(attached.started);
        assert_eq!(room.status(), RoomStatus::Running);
        assert_eq!(room.connection_count(), 1);

        match rx.recv().await.unwrap() {
            ServerMessage::Init(init) => {
                assert_eq!(init.seed, "abc123");
                assert_eq!(init.room_id, "room-1");
                assert_eq!(init.player_id, alice());
                assert_eq!(init.t0, 1000);
                assert_eq!(init.tick_rate, 20);
                assert_eq!(init, attached.init);
            }
            other => panic!("expected INIT, got {other:?}"),
        }

        let (tx2, _rx2) = channel();
        let second = room.attach(PlayerId::from("bob"), tx2, 1000).unwrap();
        assert!(!second.started);
        assert_ne!(second.conn_id, attached.conn_id);
    }

    #[tokio::test]
    async fn test_spawn_event_logged() {
        let store = Store::memory();
        let mut room = session_with(store.clone()).await;
        let (tx, _rx) = channel();
        room.attach(alice(), tx, 5).unwrap();

        let events = wait_for_events(&store, "room-1", 1).await;
        assert_eq!(events[0].offset, 0);
        assert_eq!(events[0].kind, EventKind::Spawn);
        assert_eq!(events[0].who, "alice");
        assert_eq!(room.log_status().emitted_offset, 1);
    }

    #[tokio::test]
    async fn test_tick_broadcasts_state_with_offset() {
        let mut room = session().await;
        let (tx, mut rx) = channel();
        room.attach(alice(), tx, 0).unwrap();
        let _init = rx.recv().await.unwrap();

        room.run_tick(50).unwrap();
        match rx.recv().await.unwrap() {
            ServerMessage::State(frame) => {
                assert_eq!(frame.tick, 1);
                assert_eq!(frame.t, 50);
                assert_eq!(frame.log_offset, 1);
                assert_eq!(frame.players.len(), 1);
                assert_eq!(frame.npcs.len(), 3);
            }
            other => panic!("expected STATE, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_input_moves_player_forward_one_tick() {
        let mut room = session().await;
        let (tx, _rx) = channel();
        let conn = room.attach(alice(), tx, 0).unwrap().conn_id;
        let before = room.state().get_player(&alice()).unwrap().position;

        let outcome = room.handle_input(&alice(), conn, &InputCommand::movement(0, 1.0, 0.0), 0).unwrap();
        assert_eq!(outcome, InputOutcome::Applied);
        room.run_tick(50);

        // One tick at 3 u/s never leaves the spawn cell, so no wall applies.
        let after = room.state().get_player(&alice()).unwrap().position;
        assert!((after.z - before.z - 0.15).abs() < 1e-9);
        assert_eq!(after.x, before.x);
    }

    #[tokio::test]
    async fn test_input_from_unknown_or_stale_connection() {
        let mut room = session().await;
        let err = room.handle_input(&alice(), 1, &InputCommand::movement(0, 1.0, 0.0), 0).unwrap_err();
        assert_eq!(err, RoomError::UnknownPlayer(alice()));
        assert!(err.is_protocol_violation());

        let (tx1, mut rx1) = channel();
        let first = room.attach(alice(), tx1, 0).unwrap().conn_id;
        let (tx2, _rx2) = channel();
        let second = room.attach(alice(), tx2, 0).unwrap().conn_id;

        // The first connection's queue is closed once it is superseded.
        let _init = rx1.recv().await.unwrap();
        assert!(rx1.recv().await.is_none());

        let err = room.handle_input(&alice(), first, &InputCommand::movement(0, 1.0, 0.0), 0).unwrap_err();
        assert_eq!(err, RoomError::StaleConnection { player_id: alice(), conn_id: first });
        assert!(room.handle_input(&alice(), second, &InputCommand::movement(0, 1.0, 0.0), 0).is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_input_is_stale() {
        let mut room = session().await;
        let (tx, _rx) = channel();
        let conn = room.attach(alice(), tx, 0).unwrap().conn_id;
        let sprint = InputCommand::movement(4, 1.0, 0.0).with_action(Action::Sprint);

        assert_eq!(room.handle_input(&alice(), conn, &sprint, 0), Ok(InputOutcome::Applied));
        assert_eq!(room.handle_input(&alice(), conn, &sprint, 0), Ok(InputOutcome::Stale));
        assert_eq!(room.state().get_player(&alice()).unwrap().velocity.z, 6.0);
    }

    #[tokio::test]
    async fn test_detach_only_matching_connection() {
        let mut room = session().await;
        let (tx1, _rx1) = channel();
        let first = room.attach(alice(), tx1, 0).unwrap().conn_id;
        let (tx2, _rx2) = channel();
        let second = room.attach(alice(), tx2, 0).unwrap().conn_id;

        assert!(!room.detach(&alice(), first));
        assert_eq!(room.connection_count(), 1);
        assert!(room.state().get_player(&alice()).is_some());
        assert!(room.idle_for(Instant::now()).is_none());

        assert!(room.detach(&alice(), second));
        assert_eq!(room.connection_count(), 0);
        assert!(room.state().get_player(&alice()).is_none());
        assert!(room.idle_for(Instant::now()).is_some());
    }

    #[tokio::test]
    async fn test_closed_client_is_skipped() {
        let mut room = session().await;
        let (tx, rx) = channel();
        room.attach(alice(), tx, 0).unwrap();
        drop(rx);
        let (tx_bob, mut rx_bob) = channel();
        room.attach(PlayerId::from("bob"), tx_bob, 0).unwrap();
        let _init = rx_bob.recv().await.unwrap();

        assert!(room.run_tick(50).is_some());
        assert!(matches!(rx_bob.recv().await.unwrap(), ServerMessage::State(_)));
    }

    #[tokio::test]
    async fn test_stop_rejects_attach() {
        let mut room = session().await;
        let (tx, mut rx) = channel();
        room.attach(alice(), tx, 0).unwrap();
        assert!(room.stop().is_some());
        assert!(room.stop().is_none());
        assert_eq!(room.status(), RoomStatus::Stopped);
        assert!(room.run_tick(0).is_none());

        let _init = rx.recv().await.unwrap();
        assert!(rx.recv().await.is_none());

        let (tx2, _rx2) = channel();
        assert_eq!(
            room.attach(PlayerId::from("bob"), tx2, 0).unwrap_err(),
            RoomError::Stopped("room-1".into())
        );
    }

    #[tokio::test]
    async fn test_snapshot_written_on_cadence() {
        let memory = MemoryStore::new();
        let mut room = session_with(Store::Memory(memory.clone())).await;
        let (tx, _rx) = channel();
        room.attach(alice(), tx, 0).unwrap();

        for _ in 0..100 {
            room.run_tick(0);
        }
        for _ in 0..200 {
            if !memory.snapshot_ticks("room-1").await.is_empty() {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(memory.snapshot_ticks("room-1").await, vec![100]);
    }

    async fn run_until_snapshot(room: &mut RoomSession, memory: &MemoryStore, count: usize) {
        let (tx, _rx) = channel();
        room.attach(alice(), tx, 0).unwrap();
        for _ in 0..100 {
            room.run_tick(0);
        }
        for _ in 0..200 {
            if memory.snapshot_ticks("room-1").await.len() >= count {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("snapshot {count} was never written");
    }

    #[tokio::test]
    async fn test_recreated_room_keeps_both_snapshots() {
        let memory = MemoryStore::new();
        let store = Store::Memory(memory.clone());

        let mut first = session_with(store.clone()).await;
        run_until_snapshot(&mut first, &memory, 1).await;
        let succession = first.stop().unwrap();

        let issuer = ReceiptIssuer::new(b"salt", store.clone()).unwrap();
        let log = EventLog::succeed(succession, store.clone());
        let mut second = RoomSession::with_log("abc123", RoomConfig::default(), log, store, issuer).unwrap();
        assert_eq!(second.room_id(), "room-1");
        assert_ne!(second.incarnation(), first.incarnation());
        run_until_snapshot(&mut second, &memory, 2).await;

        assert_eq!(memory.snapshot_ticks("room-1").await, vec![100, 100]);
        assert!(second.log_status().emitted_offset > first.log_status().emitted_offset);
    }

    #[tokio::test]
    async fn test_finish_logs_event_and_issues_receipt() {
        let memory = MemoryStore::new();
        let store = Store::Memory(memory.clone());
        let mut room = session_with(store.clone()).await;

        // Single opening from the spawn cell towards the exit.
        let mut maze = Maze::closed(5, 3);
        maze.open_edge(Coord::new(2, 2), Direction::East);
        room.state.maze = maze;
        room.state.consumables.clear();

        let (tx, _rx) = channel();
        let conn = room.attach(alice(), tx, 0).unwrap().conn_id;
        room.handle_input(&alice(), conn, &InputCommand::movement(0, 0.0, 1.0), 0).unwrap();

        let mut finishes = Vec::new();
        for _ in 0..40 {
            if let Some(result) = room.run_tick(0) {
                finishes.extend(result.finishes);
            }
        }
        assert_eq!(finishes.len(), 1);
        assert_eq!(finishes[0].player_id, alice());

        let events = wait_for_events(&store, "room-1", 2).await;
        let finish_events: Vec<_> = events.iter().filter(|e| e.kind == EventKind::Finish).collect();
        assert_eq!(finish_events.len(), 1);
        assert_eq!(finish_events[0].payload["timeMs"], finishes[0].time_ms);

        for _ in 0..200 {
            if memory.receipt_count().await == 1 {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("finish receipt was not persisted");
    }

    #[tokio::test]
    async fn test_info_reports_log_status() {
        let mut room = session().await;
        let (tx, _rx) = channel();
        room.attach(alice(), tx, 0).unwrap();
        room.run_tick(0);

        let info = room.info();
        assert_eq!(info.room_id, "room-1");
        assert_eq!(info.incarnation, room.incarnation());
        assert_eq!(info.status, RoomStatus::Running);
        assert_eq!(info.tick, 1);
        assert_eq!(info.players, vec![alice()]);
        assert_eq!(info.connections, 1);
        assert_eq!(info.log.emitted_offset, 1);

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["status"], "running");
        assert_eq!(json["log"]["emittedOffset"], 1);
    }
}
