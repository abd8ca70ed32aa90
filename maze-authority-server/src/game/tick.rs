//! Authoritative Simulation Tick
//!
//! One fixed-length step of a room's world. Pure: no clocks, no I/O. Events
//! come back to the caller, which stamps offsets and broadcasts.

use crate::core::hash::hash_path;
use crate::core::vec3::Vec3;
use crate::game::collision::step_position;
use crate::game::events::{FinishRecord, GameEvent};
use crate::game::npc::{behavior_for, NpcContext};
use crate::game::state::{MovementState, RoomState};

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick, in emission order
    pub events: Vec<GameEvent>,
    /// Players that reached the exit for the first time this tick
    pub finishes: Vec<FinishRecord>,
    /// Whether this tick is on the snapshot cadence
    pub snapshot_due: bool,
}

/// Configuration for room simulation.
#[derive(Clone, Debug, PartialEq)]
pub struct RoomConfig {
    /// Ticks per second
    pub tick_rate: u32,
    /// Maze width in cells
    pub maze_width: i32,
    /// Maze height in cells
    pub maze_height: i32,
    /// Extra wall removals per cell
    pub loopiness: f64,
    /// Map format version sent in INIT
    pub map_version: u32,
    /// Consumables placed per room
    pub consumable_count: usize,
    /// Pickup distance
    pub pickup_radius: f64,
    /// Speed without sprint (units/s)
    pub walk_speed: f64,
    /// Speed with sprint (units/s)
    pub sprint_speed: f64,
    /// Seconds between snapshots
    pub snapshot_interval_secs: u32,
    /// NPC travel speed (units/s)
    pub npc_speed: f64,
    /// Maximum per-tick NPC wander on each axis
    pub npc_jitter: f64,
    /// Distance at which cautious NPCs back off
    pub npc_flee_radius: f64,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            tick_rate: crate::TICK_RATE,
            maze_width: 31,
            maze_height: 31,
            loopiness: 0.08,
            map_version: 1,
            consumable_count: 8,
            pickup_radius: 0.6,
            walk_speed: 3.0,
            sprint_speed: 6.0,
            snapshot_interval_secs: 5,
            npc_speed: 1.5,
            npc_jitter: 0.1,
            npc_flee_radius: 4.0,
        }
    }
}

impl RoomConfig {
    /// Tick length in seconds.
    #[inline]
    pub fn dt(&self) -> f64 {
        1.0 / f64::from(self.tick_rate.max(1))
    }

    /// Ticks between snapshots (`tick_rate * snapshot_interval_secs`).
    #[inline]
    pub fn snapshot_every_ticks(&self) -> u64 {
        (u64::from(self.tick_rate) * u64::from(self.snapshot_interval_secs)).max(1)
    }

    /// Elapsed race time at `tick`, in whole milliseconds.
    #[inline]
    pub fn elapsed_ms(&self, tick: u64) -> u64 {
        (tick as f64 * self.dt() * 1000.0).round() as u64
    }
}

/// Run one simulation tick.
///
/// 1. Advance the tick counter.
/// 2. Move every player, refresh movement state, extend path history,
///    resolve pickups, detect first arrival at the exit.
/// 3. Move every NPC by its persona policy.
///
/// Deterministic given the state (players iterate in id order, all
/// randomness comes from `state.rng`).
pub fn tick(state: &mut RoomState, config: &RoomConfig) -> TickResult {
    let mut result = TickResult::default();

    // 1. Advance tick counter
    state.tick += 1;

    // 2. Players
    update_players(state, config, &mut result);

    // 3. NPCs
    update_npcs(state, config);

    result.snapshot_due = state.tick % config.snapshot_every_ticks() == 0;
    result
}

fn update_players(state: &mut RoomState, config: &RoomConfig, result: &mut TickResult) {
    let dt = config.dt();
    let now = state.tick;
    let RoomState { maze, players, consumables, .. } = state;
    let exit = maze.exit();

    for player in players.values_mut() {
        let old_cell = player.path_cell();
        player.position = step_position(player.position, player.velocity, dt, maze);
        player.movement = if player.velocity.is_moving() {
            MovementState::Walk
        } else {
            MovementState::Idle
        };

        let cell = player.path_cell();
        if cell != old_cell {
            player.path_cells.push(cell.key());
        }

        for item in consumables.iter_mut().filter(|c| !c.taken) {
            let d = (f64::from(item.x) - player.position.x).hypot(f64::from(item.y) - player.position.z);
            if d < config.pickup_radius && item.take() {
                result.events.push(GameEvent::pickup(now, &player.id, &item.id));
            }
        }

        if cell == exit && !player.has_finished() {
            player.finished_tick = Some(now);
            let finish = FinishRecord {
                player_id: player.id.clone(),
                tick: now,
                time_ms: config.elapsed_ms(now),
                path_hash: hash_path(&player.path_cells),
            };
            result.events.push(GameEvent::finish(now, &finish));
            result.finishes.push(finish);
        }
    }
}

fn update_npcs(state: &mut RoomState, config: &RoomConfig) {
    let dt = config.dt();
    let player_positions: Vec<Vec3> = state.players.values().map(|p| p.position).collect();
    let RoomState { maze, npcs, rng, .. } = state;

    for npc in npcs.iter_mut() {
        let ctx = NpcContext {
            position: npc.position,
            players: &player_positions,
            dt,
            speed: config.npc_speed,
            jitter: config.npc_jitter,
            flee_radius: config.npc_flee_radius,
        };
        let intent = behavior_for(npc.persona).intent(&ctx, rng);
        npc.position = step_position(npc.position, intent, dt, maze);
    }
}

// =============================================================================
// TESTS
// =============================================================================
