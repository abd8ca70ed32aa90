//! Network Layer
//!
//! Real-time WebSocket rooms and the HTTP boundary.
//! This layer is **non-deterministic** - all simulation runs through `game/`.
//!
//! ## Module Structure
//!
//! - `protocol`: Wire messages and inbound validation
//! - `room`: One live room (world, connections, event log)
//! - `registry`: Sharded map of live rooms
//! - `ops`: Chaos knobs and counters
//! - `server`: WebSocket listener, tick loops, idle eviction
//! - `http`: axum router

pub mod protocol;
pub mod room;
pub mod registry;
pub mod ops;
pub mod server;
pub mod http;

pub use protocol::{ClientMessage, InitMessage, ServerMessage, StateFrame, ValidationError};
pub use room::{RoomError, RoomInfo, RoomOpenError, RoomSession, RoomStatus};
pub use registry::{RoomHandle, RoomRegistry};
pub use ops::{ChaosControl, ChaosKnobs, Metrics};
pub use server::{AppState, ConnectParams, GameServer, ServerConfig, ServerError};
pub use http::{build_router, serve_http, ApiError};
