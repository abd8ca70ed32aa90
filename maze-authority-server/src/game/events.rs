//! Game Events
//!
//! Events generated during simulation, and the offset-stamped records they
//! become once admitted to a room's event log.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::game::state::PlayerId;

/// Event kind. Serialized by variant name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Player attached to the room
    Spawn,
    /// Input acknowledged
    InputAck,
    /// Player chose a fork
    ForkPick,
    /// Consumable picked up
    Pickup,
    /// Trap triggered
    Trap,
    /// Player reached the exit
    Finish,
}

/// A gameplay event, before it has an offset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick the event happened on
    pub tick: u64,
    /// What happened
    pub kind: EventKind,
    /// Actor identifier
    pub who: String,
    /// Free-form payload
    pub payload: Value,
}

impl GameEvent {
    /// Create an event.
    pub fn new(tick: u64, kind: EventKind, who: impl Into<String>, payload: Value) -> Self {
        Self { tick, kind, who: who.into(), payload }
    }

    /// Player attached.
    pub fn spawn(tick: u64, player: &PlayerId) -> Self {
        Self::new(tick, EventKind::Spawn, player.as_str(), json!({}))
    }

    /// Consumable taken.
    pub fn pickup(tick: u64, player: &PlayerId, consumable_id: &str) -> Self {
        Self::new(tick, EventKind::Pickup, player.as_str(), json!({ "id": consumable_id }))
    }

    /// Exit reached.
    pub fn finish(tick: u64, finish: &FinishRecord) -> Self {
        Self::new(
            tick,
            EventKind::Finish,
            finish.player_id.as_str(),
            json!({ "timeMs": finish.time_ms, "pathHash": finish.path_hash }),
        )
    }
}

/// Server-observed completion data for one player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishRecord {
    /// Who finished
    pub player_id: PlayerId,
    /// Tick of arrival
    pub tick: u64,
    /// Elapsed time, `round(tick * dt * 1000)`
    pub time_ms: u64,
    /// Hash over the ordered visited cells
    pub path_hash: String,
}

/// An event as stored in the log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Per-room position, gap-free from 0
    pub offset: u64,
    /// Admission time (unix ms)
    pub ts: i64,
    /// Tick the event happened on
    pub tick: u64,
    /// What happened
    pub kind: EventKind,
    /// Actor identifier
    pub who: String,
    /// Free-form payload
    pub payload: Value,
}

impl EventRecord {
    /// Stamp an event with its offset and admission time.
    pub fn from_event(offset: u64, ts: i64, event: GameEvent) -> Self {
        Self {
            offset,
            ts,
            tick: event.tick,
            kind: event.kind,
            who: event.who,
            payload: event.payload,
        }
    }
}
