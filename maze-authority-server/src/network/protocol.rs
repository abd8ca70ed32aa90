//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket. Every frame
//! is a JSON text message. Server messages carry a `kind` tag (`INIT` or
//! `STATE`); the only client message is an input.
//!
//! Inbound text is validated into a closed set of typed variants before
//! anything touches room state. Anything else is rejected whole.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::core::vec3::Vec3;
use crate::game::input::InputCommand;
use crate::game::state::{MovementState, Persona, PlayerId, RoomState};

/// `kind` value a client may put on an input message.
pub const INPUT_KIND: &str = "INPUT";

// =============================================================================
// ERRORS
// =============================================================================

/// Why an inbound message was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Not JSON at all
    #[error("malformed json: {0}")]
    Malformed(String),
    /// JSON, but not an object
    #[error("message is not an object")]
    NotAnObject,
    /// Object tagged with a kind clients may not send
    #[error("unexpected message kind {0:?}")]
    UnexpectedKind(String),
    /// Object does not match the input schema
    #[error("schema violation: {0}")]
    Schema(String),
    /// Sequence number outside the representable range
    #[error("sequence number {0} out of range")]
    SeqOutOfRange(u64),
}

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Player input.
    Input(InputCommand),
}

impl ClientMessage {
    /// Validate a text frame.
    ///
    /// Accepts an INPUT object, optionally tagged `"kind": "INPUT"`.
    /// Unknown extra fields are ignored.
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        let value: Value = serde_json::from_str(text).map_err(|e| ValidationError::Malformed(e.to_string()))?;
        let Some(object) = value.as_object() else {
            return Err(ValidationError::NotAnObject);
        };

        match object.get("kind") {
            None => {}
            Some(Value::String(kind)) if kind == INPUT_KIND => {}
            Some(other) => {
                let kind = other.as_str().map_or_else(|| other.to_string(), str::to_string);
                return Err(ValidationError::UnexpectedKind(kind));
            }
        }

        let input: InputCommand = serde_json::from_value(value).map_err(|e| ValidationError::Schema(e.to_string()))?;
        if i64::try_from(input.seq).is_err() {
            return Err(ValidationError::SeqOutOfRange(input.seq));
        }
        Ok(Self::Input(input))
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ServerMessage {
    /// Sent once per connection.
    #[serde(rename = "INIT")]
    Init(InitMessage),

    /// Sent every tick.
    #[serde(rename = "STATE")]
    State(StateFrame),
}

/// Connection handshake payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitMessage {
    /// Hex seed the maze is built from
    pub seed: String,
    /// Layout fingerprint for client-side verification
    pub layout_hash: String,
    /// Server time (unix ms)
    pub t0: i64,
    /// Room identifier
    pub room_id: String,
    /// Player identifier
    pub player_id: PlayerId,
    /// Map format version
    pub map_version: u32,
    /// Ticks per second
    pub tick_rate: u32,
}

/// Per-tick world summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFrame {
    /// Server time (unix ms)
    pub t: i64,
    /// Tick number
    pub tick: u64,
    /// Event-log offset (next offset to be assigned)
    pub log_offset: u64,
    /// Players
    pub players: Vec<PlayerSummary>,
    /// NPCs
    pub npcs: Vec<NpcSummary>,
    /// Consumables
    pub consumables: Vec<ConsumableSummary>,
    /// Transient effects
    pub effects: Vec<Effect>,
}

/// Player entry in a STATE frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    /// Identifier
    pub id: PlayerId,
    /// Position
    pub pos: Vec3,
    /// Velocity
    pub v: Vec3,
    /// Movement state
    pub st: MovementState,
}

/// NPC entry in a STATE frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcSummary {
    /// Identifier
    pub id: String,
    /// Position
    pub pos: Vec3,
    /// Personality
    pub persona: Persona,
}

/// Consumable entry in a STATE frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumableSummary {
    /// Identifier
    pub id: String,
    /// Whether it has been picked up
    pub taken: bool,
}

/// Kind of transient visual hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    /// Briefly see through walls
    WallPeek,
    /// Direction-to-exit hint
    CompassPing,
}

/// Transient effect. The simulation does not produce any yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    /// Kind
    pub kind: EffectKind,
    /// Remaining lifetime in ticks
    pub ttl: u32,
}

impl InitMessage {
    /// INIT for `player_id` joining `state`.
    pub fn for_room(state: &RoomState, player_id: PlayerId, map_version: u32, tick_rate: u32, now_ms: i64) -> Self {
        Self {
            seed: state.seed.clone(),
            layout_hash: state.layout_hash.clone(),
            t0: now_ms,
            room_id: state.room_id.clone(),
            player_id,
            map_version,
            tick_rate,
        }
    }
}

impl StateFrame {
    /// Summarize `state` as it stands after a tick.
    pub fn from_room(state: &RoomState, log_offset: u64, now_ms: i64) -> Self {
        Self {
            t: now_ms,
            tick: state.tick,
            log_offset,
            players: state
                .players
                .values()
                .map(|p| PlayerSummary {
                    id: p.id.clone(),
                    pos: p.position,
                    v: p.velocity,
                    st: p.movement,
                })
                .collect(),
            npcs: state
                .npcs
                .iter()
                .map(|n| NpcSummary { id: n.id.clone(), pos: n.position, persona: n.persona })
                .collect(),
            consumables: state
                .consumables
                .iter()
                .map(|c| ConsumableSummary { id: c.id.clone(), taken: c.taken })
                .collect(),
            effects: Vec::new(),
        }
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::input::Action;
    use crate::game::tick::RoomConfig;
    use serde_json::json;

    fn room() -> RoomState {
        RoomState::new("room-1", "abc123", &RoomConfig::default()).unwrap()
    }

    #[test]
    fn test_parse_minimal_input() {
        let msg = ClientMessage::parse(r#"{"t_client": 10, "seq": 0, "move": [1, 0, 0]}"#).unwrap();
        let ClientMessage::Input(input) = msg;
        assert_eq!(input.seq, 0);
        assert_eq!(input.move_vec, [1.0, 0.0, 0.0]);
        assert_eq!(input.action, Action::None);
    }

    #[test]
    fn test_parse_full_input() {
        let text = json!({
            "kind": "INPUT",
            "t_client": 99,
            "seq": 4,
            "move": [0.5, -1, 0],
            "look": [0.1, 0.2],
            "action": "Sprint",
            "sig": "abc",
            "extra": true
        })
        .to_string();
        let ClientMessage::Input(input) = ClientMessage::parse(&text).unwrap();
        assert_eq!(input.action, Action::Sprint);
        assert_eq!(input.look, Some([0.1, 0.2]));
        assert_eq!(input.sig.as_deref(), Some("abc"));
    }

    #[test]
    fn test_rejects_invalid_messages() {
        let cases = [
            ("not json", "malformed"),
            ("[1,2,3]", "object"),
            (r#"{"kind":"STATE","seq":0,"move":[0,0,0],"t_client":0}"#, "kind"),
            (r#"{"kind":7,"seq":0,"move":[0,0,0],"t_client":0}"#, "kind"),
            (r#"{"t_client":0,"move":[0,0,0]}"#, "schema"),
            (r#"{"t_client":0,"seq":-1,"move":[0,0,0]}"#, "schema"),
            (r#"{"t_client":0,"seq":1.5,"move":[0,0,0]}"#, "schema"),
            (r#"{"t_client":0,"seq":1,"move":[0,0]}"#, "schema"),
            (r#"{"t_client":0,"seq":1,"move":[0,0,0],"look":[1]}"#, "schema"),
            (r#"{"t_client":0,"seq":1,"move":[0,0,0],"action":"Teleport"}"#, "schema"),
            (r#"{"t_client":0,"seq":1,"move":["a",0,0]}"#, "schema"),
            (r#"{"t_client":0,"seq":18446744073709551615,"move":[0,0,0]}"#, "sequence"),
        ];
        for (text, expected) in cases {
            let err = ClientMessage::parse(text).unwrap_err();
            assert!(
                err.to_string().contains(expected),
                "{text}: got {err}, expected {expected}"
            );
        }
    }

    #[test]
    fn test_init_wire_shape() {
        let state = room();
        let init = InitMessage::for_room(&state, PlayerId::from("alice"), 1, 20, 1234);
        let json: Value = serde_json::from_str(&ServerMessage::Init(init).to_json().unwrap()).unwrap();
        assert_eq!(json["kind"], "INIT");
        assert_eq!(json["seed"], "abc123");
        assert_eq!(json["layoutHash"], state.layout_hash.as_str());
        assert_eq!(json["t0"], 1234);
        assert_eq!(json["roomId"], "room-1");
        assert_eq!(json["playerId"], "alice");
        assert_eq!(json["mapVersion"], 1);
        assert_eq!(json["tickRate"], 20);
    }

    #[test]
    fn test_state_wire_shape() {
        let mut state = room();
        state.add_player(PlayerId::from("alice"), 0);
        let frame = StateFrame::from_room(&state, 3, 5000);
        let json: Value = serde_json::from_str(&ServerMessage::State(frame).to_json().unwrap()).unwrap();

        assert_eq!(json["kind"], "STATE");
        assert_eq!(json["t"], 5000);
        assert_eq!(json["tick"], 0);
        assert_eq!(json["log_offset"], 3);
        assert_eq!(json["players"][0], json!({"id": "alice", "pos": [1.5, 0.0, 1.5], "v": [0.0, 0.0, 0.0], "st": "idle"}));
        assert_eq!(json["npcs"][2]["persona"], "Gambler");
        assert_eq!(json["consumables"].as_array().unwrap().len(), 8);
        assert_eq!(json["consumables"][0]["taken"], false);
        assert_eq!(json["effects"], json!([]));
    }

    #[test]
    fn test_server_message_roundtrip() {
        let state = room();
        let msg = ServerMessage::State(StateFrame::from_room(&state, 0, 1));
        let parsed = ServerMessage::from_json(&msg.to_json().unwrap()).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_effect_kind_names() {
        let effect = Effect { kind: EffectKind::CompassPing, ttl: 3 };
        assert_eq!(serde_json::to_value(effect).unwrap(), json!({"kind": "compass_ping", "ttl": 3}));
    }
}
