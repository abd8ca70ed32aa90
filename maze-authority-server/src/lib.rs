//! # Maze Authority Server
//!
//! Authoritative room server for the maze race: seeded mazes, fixed-rate
//! simulation, per-room event logs and signed completion receipts.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    MAZE AUTHORITY SERVER                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── rng.rs      - Seeded mulberry32 PRNG                    │
//! │  ├── hash.rs     - Seed derivation, layout/path hashes       │
//! │  └── vec3.rs     - Plain 3-vector                            │
//! │                                                              │
//! │  game/           - Room simulation (no I/O)                  │
//! │  ├── maze.rs     - Seeded maze generation                    │
//! │  ├── collision.rs- Substep motion against walls              │
//! │  ├── state.rs    - Room, player, NPC, consumable state       │
//! │  ├── input.rs    - Input commands                            │
//! │  ├── npc.rs      - Persona movement policies                 │
//! │  ├── events.rs   - Gameplay events                           │
//! │  └── tick.rs     - Authoritative simulation step             │
//! │                                                              │
//! │  network/        - Networking (non-deterministic)            │
//! │  ├── protocol.rs - Wire messages                             │
//! │  ├── room.rs     - Live room session                         │
//! │  ├── registry.rs - Sharded room registry                     │
//! │  ├── ops.rs      - Chaos knobs, counters                     │
//! │  ├── server.rs   - WebSocket server, tick loops              │
//! │  └── http.rs     - HTTP boundary                             │
//! │                                                              │
//! │  store/          - Event log outbox, snapshots, receipts     │
//! │  proof/          - HMAC completion receipts                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! Given a seed, `core/` and `game/` rebuild the same maze bit for bit on
//! any platform:
//! - No HashMap (uses BTreeMap for sorted iteration)
//! - No system time dependencies
//! - All randomness from seeded mulberry32

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;
pub mod proof;
pub mod store;

// Re-export commonly used types
pub use core::rng::DeterministicRng;
pub use core::vec3::Vec3;
pub use game::maze::Maze;
pub use game::state::{PlayerId, RoomState};
pub use game::tick::RoomConfig;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default simulation tick rate (Hz)
pub const TICK_RATE: u32 = 20;

/// Current wall-clock time in unix milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
