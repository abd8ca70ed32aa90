//! Room State Definitions
//!
//! All world state for one room's simulation. The room owns its players in
//! an arena keyed by [`PlayerId`]; connection handles live elsewhere.
//! Uses BTreeMap for deterministic iteration order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::rng::{seed_from_hex, DeterministicRng};
use crate::core::vec3::Vec3;
use crate::game::maze::{Coord, Maze, MazeError};
use crate::game::tick::RoomConfig;

/// Mixed into the room RNG seed so it never mirrors the maze RNG.
const ROOM_RNG_SALT: u32 = 0xDEAD_BEEF;

// =============================================================================
// PLAYER ID
// =============================================================================

/// Client-chosen player identifier.
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Create from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// =============================================================================
// PLAYER
// =============================================================================

/// Movement state reported in STATE frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementState {
    /// No horizontal velocity.
    #[default]
    Idle,
    /// Moving.
    Walk,
    /// Reserved for a sprint animation state; the tick only derives idle/walk.
    Sprint,
}

/// One connected player.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Identifier
    pub id: PlayerId,
    /// World position; `y` is vertical
    pub position: Vec3,
    /// Velocity in units per second
    pub velocity: Vec3,
    /// Derived each tick from velocity
    pub movement: MovementState,
    /// Last applied input sequence number, -1 before any input
    pub last_seq: i64,
    /// Server time of the last applied input (unix ms)
    pub last_input_at_ms: i64,
    /// Last look vector sent by the client
    pub look: Option<[f64; 2]>,
    /// Ordered visited cell keys (`"x,y"`)
    pub path_cells: Vec<String>,
    /// Tick at which the player first reached the exit
    pub finished_tick: Option<u64>,
}

impl Player {
    /// Spawn a player at the center of the maze start cell.
    pub fn new(id: PlayerId, maze: &Maze, now_ms: i64) -> Self {
        let start = maze.start();
        Self {
            id,
            position: Vec3::new(f64::from(start.x) + 0.5, 0.0, f64::from(start.y) + 0.5),
            velocity: Vec3::ZERO,
            movement: MovementState::Idle,
            last_seq: -1,
            last_input_at_ms: now_ms,
            look: None,
            path_cells: vec![start.key()],
            finished_tick: None,
        }
    }

    /// Grid cell the player occupies for path and exit purposes.
    #[inline]
    pub fn path_cell(&self) -> Coord {
        Coord::new(self.position.x.floor() as i32, self.position.z.floor() as i32)
    }

    /// Whether the player has already reached the exit.
    #[inline]
    pub fn has_finished(&self) -> bool {
        self.finished_tick.is_some()
    }
}

// =============================================================================
// NPC
// =============================================================================

/// NPC personality, selecting its movement policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Persona {
    /// Pursues the nearest player
    Aggro,
    /// Backs away from nearby players
    Cautious,
    /// Wanders at random
    Gambler,
}

/// A non-player character.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Npc {
    /// Identifier
    pub id: String,
    /// Personality
    pub persona: Persona,
    /// World position
    pub position: Vec3,
}

// =============================================================================
// CONSUMABLE
// =============================================================================

/// A pickup placed on the grid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumable {
    /// Identifier (`c0`..)
    pub id: String,
    /// Column
    pub x: i32,
    /// Row
    pub y: i32,
    /// Once true, never reverts
    pub taken: bool,
}

impl Consumable {
    /// Mark as taken. Returns true only on the first call.
    pub fn take(&mut self) -> bool {
        if self.taken {
            return false;
        }
        self.taken = true;
        true
    }
}

// =============================================================================
// ROOM STATE
// =============================================================================

/// Complete simulation state of one room.
#[derive(Clone, Debug)]
pub struct RoomState {
    /// Room identifier
    pub room_id: String,
    /// Hex seed the maze was built from
    pub seed: String,
    /// The maze (immutable after construction)
    pub maze: Maze,
    /// Fingerprint of the maze layout
    pub layout_hash: String,
    /// Tick counter, 0 before the first tick
    pub tick: u64,
    /// Active players (BTreeMap for deterministic order)
    pub players: BTreeMap<PlayerId, Player>,
    /// NPCs
    pub npcs: Vec<Npc>,
    /// Consumables
    pub consumables: Vec<Consumable>,
    /// RNG for consumable placement and NPC behavior
    pub rng: DeterministicRng,
}

impl RoomState {
    /// Build a fresh room: generate the maze, place consumables and NPCs.
    pub fn new(room_id: impl Into<String>, seed: impl Into<String>, config: &RoomConfig) -> Result<Self, MazeError> {
        let seed = seed.into();
        let maze = Maze::generate(&seed, config.maze_width, config.maze_height, config.loopiness)?;
        let layout_hash = maze.layout_hash()?;

        // Hex digits 8.. are unused by the maze, so the room stream is
        // independent of the layout stream.
        let room_seed = seed_from_hex(seed.get(8..).unwrap_or_default()) ^ ROOM_RNG_SALT;
        let mut rng = DeterministicRng::new(room_seed);

        let consumables = place_consumables(&maze, config.consumable_count, &mut rng);
        let npcs = spawn_npcs(&maze);

        Ok(Self {
            room_id: room_id.into(),
            seed,
            maze,
            layout_hash,
            tick: 0,
            players: BTreeMap::new(),
            npcs,
            consumables,
            rng,
        })
    }

    /// Insert a freshly spawned player, replacing any previous record.
    pub fn add_player(&mut self, id: PlayerId, now_ms: i64) -> &Player {
        let player = Player::new(id.clone(), &self.maze, now_ms);
        self.players.insert(id.clone(), player);
        &self.players[&id]
    }

    /// Remove a player from the active set.
    pub fn remove_player(&mut self, id: &PlayerId) -> Option<Player> {
        self.players.remove(id)
    }

    /// Get player by ID.
    pub fn get_player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    /// Get mutable player by ID.
    pub fn get_player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    /// Full-state snapshot for durable storage.
    ///
    /// `incarnation` tells apart rooms that reuse an id, since their ticks
    /// restart from zero.
    pub fn snapshot(&self, incarnation: &str) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.room_id.clone(),
            incarnation: incarnation.to_string(),
            tick: self.tick,
            layout_hash: self.layout_hash.clone(),
            rng_state: self.rng.state(),
            players: self.players.values().cloned().collect(),
            npcs: self.npcs.clone(),
            consumables: self.consumables.clone(),
        }
    }
}

/// `count` consumables at `2 + floor(rng * (dim - 4))` on each axis.
fn place_consumables(maze: &Maze, count: usize, rng: &mut DeterministicRng) -> Vec<Consumable> {
    let span_x = (maze.width() - 4).max(0) as usize;
    let span_y = (maze.height() - 4).max(0) as usize;
    (0..count)
        .map(|i| {
            let x = 2 + rng.next_index(span_x) as i32;
            let y = 2 + rng.next_index(span_y) as i32;
            Consumable { id: format!("c{i}"), x, y, taken: false }
        })
        .collect()
}

/// The three fixed NPCs, clustered on the start cell.
fn spawn_npcs(maze: &Maze) -> Vec<Npc> {
    let s = maze.start();
    let (x, z) = (f64::from(s.x), f64::from(s.y));
    vec![
        Npc { id: "n1".into(), persona: Persona::Aggro, position: Vec3::new(x, 0.0, z) },
        Npc { id: "n2".into(), persona: Persona::Cautious, position: Vec3::new(x + 1.0, 0.0, z) },
        Npc { id: "n3".into(), persona: Persona::Gambler, position: Vec3::new(x, 0.0, z + 1.0) },
    ]
}

/// Persisted full-state snapshot of a room at one tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    /// Room identifier
    pub room_id: String,
    /// Which life of the room id this is
    pub incarnation: String,
    /// Tick the snapshot was taken at
    pub tick: u64,
    /// Layout fingerprint
    pub layout_hash: String,
    /// Room RNG state, enough to resume NPC behavior
    pub rng_state: u32,
    /// Players
    pub players: Vec<Player>,
    /// NPCs
    pub npcs: Vec<Npc>,
    /// Consumables
    pub consumables: Vec<Consumable>,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomState {
        RoomState::new("room-1", "abc123", &RoomConfig::default()).unwrap()
    }

    #[test]
    fn test_room_construction() {
        let state = room();
        assert_eq!(state.tick, 0);
        assert!(state.players.is_empty());
        assert_eq!(state.consumables.len(), 8);
        assert_eq!(state.npcs.len(), 3);
        assert_eq!(state.layout_hash, state.maze.layout_hash().unwrap());

        for (i, c) in state.consumables.iter().enumerate() {
            assert_eq!(c.id, format!("c{i}"));
            assert!((2..29).contains(&c.x));
            assert!((2..29).contains(&c.y));
            assert!(!c.taken);
        }
    }

    #[test]
    fn test_room_construction_is_deterministic() {
        let a = room();
        let b = room();
        assert_eq!(a.consumables, b.consumables);
        assert_eq!(a.npcs, b.npcs);
        assert_eq!(a.rng, b.rng);

        let other = RoomState::new("room-1", "abc12300ffff0000", &RoomConfig::default()).unwrap();
        assert_ne!(a.consumables, other.consumables);
    }

    #[test]
    fn test_npc_layout() {
        let state = room();
        let personas: Vec<_> = state.npcs.iter().map(|n| (n.id.as_str(), n.persona)).collect();
        assert_eq!(
            personas,
            vec![("n1", Persona::Aggro), ("n2", Persona::Cautious), ("n3", Persona::Gambler)]
        );
        assert_eq!(state.npcs[1].position, Vec3::new(2.0, 0.0, 1.0));
        assert_eq!(state.npcs[2].position, Vec3::new(1.0, 0.0, 2.0));
    }

    #[test]
    fn test_player_spawn() {
        let mut state = room();
        let p = state.add_player(PlayerId::from("alice"), 1_000);
        assert_eq!(p.position, Vec3::new(1.5, 0.0, 1.5));
        assert_eq!(p.last_seq, -1);
        assert_eq!(p.path_cells, vec!["1,1".to_string()]);
        assert_eq!(p.path_cell(), Coord::new(1, 1));
        assert!(!p.has_finished());

        assert!(state.remove_player(&PlayerId::from("alice")).is_some());
        assert!(state.get_player(&PlayerId::from("alice")).is_none());
    }

    #[test]
    fn test_consumable_take_is_monotonic() {
        let mut c = Consumable { id: "c0".into(), x: 2, y: 2, taken: false };
        assert!(c.take());
        assert!(!c.take());
        assert!(c.taken);
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut state = room();
        state.add_player(PlayerId::from("bob"), 0);
        let snap = state.snapshot("first");
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["roomId"], "room-1");
        assert_eq!(json["incarnation"], "first");
        assert_eq!(json["players"][0]["id"], "bob");
        assert_eq!(json["players"][0]["movement"], "idle");
        assert_eq!(json["npcs"][0]["persona"], "Aggro");
    }

    #[test]
    fn test_tiny_maze_consumables_stay_in_range() {
        let config = RoomConfig { maze_width: 3, maze_height: 3, ..RoomConfig::default() };
        let state = RoomState::new("tiny", "00000000", &config).unwrap();
        assert!(state.consumables.iter().all(|c| c.x == 2 && c.y == 2));
    }
}
