//! Game Logic Module
//!
//! All room simulation code. No clocks, sockets or stores in here.
//!
//! ## Module Structure
//!
//! - `maze`: Seeded maze generation
//! - `collision`: Point-vs-wall motion integration
//! - `state`: Room, player, NPC and consumable state
//! - `input`: Input commands and idempotent application
//! - `npc`: Persona movement policies
//! - `events`: Game events and log records
//! - `tick`: Authoritative simulation step

pub mod maze;
pub mod collision;
pub mod state;
pub mod input;
pub mod npc;
pub mod events;
pub mod tick;

// Re-export key types
pub use maze::{Cell, Coord, Direction, Maze, MazeError, Walls};
pub use collision::step_position;
pub use state::{Consumable, MovementState, Npc, Persona, Player, PlayerId, RoomSnapshot, RoomState};
pub use input::{apply_input, Action, InputCommand, InputOutcome};
pub use events::{EventKind, EventRecord, FinishRecord, GameEvent};
pub use tick::{tick, RoomConfig, TickResult};
