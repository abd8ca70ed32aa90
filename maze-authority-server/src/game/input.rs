//! Input Handling
//!
//! Player input commands and their idempotent application. Inputs apply
//! immediately on receipt; the next tick integrates the new velocity.

use serde::{Deserialize, Serialize};

use crate::core::vec3::Vec3;
use crate::game::state::Player;
use crate::game::tick::RoomConfig;

// =============================================================================
// INPUT TYPES
// =============================================================================

/// Discrete action attached to an input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Plain movement
    #[default]
    None,
    /// Interact with the world
    Interact,
    /// Move at sprint speed
    Sprint,
}

/// A validated client input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputCommand {
    /// Client timestamp (ms)
    pub t_client: u64,
    /// Per-connection sequence number
    pub seq: u64,
    /// `[forward, strafe, vertical]`, vertical unused
    #[serde(rename = "move")]
    pub move_vec: [f64; 3],
    /// Optional look direction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub look: Option<[f64; 2]>,
    /// Action, `None` when absent
    #[serde(default)]
    pub action: Action,
    /// Session signature, accepted but not checked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig: Option<String>,
}

impl InputCommand {
    /// Movement-only input, for tests and tools.
    pub fn movement(seq: u64, forward: f64, strafe: f64) -> Self {
        Self {
            t_client: 0,
            seq,
            move_vec: [forward, strafe, 0.0],
            look: None,
            action: Action::None,
            sig: None,
        }
    }

    /// Same input with a different action.
    pub fn with_action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    /// `(forward, strafe)` scaled down to at most unit length.
    ///
    /// Diagonals move no faster than a single axis.
    pub fn planar_move(&self) -> (f64, f64) {
        let (forward, strafe) = (self.move_vec[0], self.move_vec[1]);
        let length = forward.hypot(strafe);
        if length > 1.0 {
            (forward / length, strafe / length)
        } else {
            (forward, strafe)
        }
    }

    /// Forward component of [`Self::planar_move`].
    #[inline]
    pub fn forward(&self) -> f64 {
        self.planar_move().0
    }

    /// Strafe component of [`Self::planar_move`].
    #[inline]
    pub fn strafe(&self) -> f64 {
        self.planar_move().1
    }
}

/// Result of offering an input to a player.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputOutcome {
    /// Sequence advanced; velocity replaced
    Applied,
    /// Sequence not newer than the last applied one; ignored
    Stale,
}

// =============================================================================
// APPLICATION
// =============================================================================

/// Velocity for an input: strafe on `x`, forward on `z`, no inertia.
pub fn input_velocity(cmd: &InputCommand, config: &RoomConfig) -> Vec3 {
    let speed = match cmd.action {
        Action::Sprint => config.sprint_speed,
        Action::None | Action::Interact => config.walk_speed,
    };
    let (forward, strafe) = cmd.planar_move();
    Vec3::new(strafe * speed, 0.0, forward * speed)
}

/// Apply `cmd` to `player` if its sequence number is strictly newer.
///
/// Re-sent and reordered inputs are dropped, so applying the same stream
/// twice has no further effect.
pub fn apply_input(player: &mut Player, cmd: &InputCommand, config: &RoomConfig, now_ms: i64) -> InputOutcome {
    let Ok(seq) = i64::try_from(cmd.seq) else {
        return InputOutcome::Stale;
    };
    if seq <= player.last_seq {
        return InputOutcome::Stale;
    }

    player.last_seq = seq;
    player.last_input_at_ms = now_ms;
    player.velocity = input_velocity(cmd, config);
    if cmd.look.is_some() {
        player.look = cmd.look;
    }
    InputOutcome::Applied
}

// =============================================================================
// TESTS
// =============================================================================
