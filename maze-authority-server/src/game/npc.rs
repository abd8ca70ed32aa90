//! NPC Behavior
//!
//! Each persona maps to a policy that turns the current world into a
//! movement intent (a velocity). Intents go through the same wall
//! integration as players, so the wire format is unaffected by which
//! policy drives an NPC.

use crate::core::rng::DeterministicRng;
use crate::core::vec3::Vec3;
use crate::game::state::Persona;

/// What a policy can see.
#[derive(Clone, Copy, Debug)]
pub struct NpcContext<'a> {
    /// The NPC's own position
    pub position: Vec3,
    /// Positions of active players, in player id order
    pub players: &'a [Vec3],
    /// Tick length in seconds
    pub dt: f64,
    /// Travel speed for purposeful movement (units/s)
    pub speed: f64,
    /// Maximum per-tick random displacement on each axis
    pub jitter: f64,
    /// Players closer than this make a cautious NPC back off
    pub flee_radius: f64,
}

impl NpcContext<'_> {
    /// Closest player on the floor plane. Ties go to the earlier player.
    pub fn nearest_player(&self) -> Option<Vec3> {
        self.players.iter().copied().fold(None, |best: Option<Vec3>, p| match best {
            Some(b) if b.planar_distance(self.position) <= p.planar_distance(self.position) => Some(b),
            _ => Some(p),
        })
    }
}

/// A movement policy.
pub trait NpcBehavior: Send + Sync {
    /// Velocity intent for this tick.
    fn intent(&self, ctx: &NpcContext<'_>, rng: &mut DeterministicRng) -> Vec3;
}

/// Heads straight for the nearest player.
#[derive(Clone, Copy, Debug, Default)]
pub struct Pursue;

impl NpcBehavior for Pursue {
    fn intent(&self, ctx: &NpcContext<'_>, _rng: &mut DeterministicRng) -> Vec3 {
        match ctx.nearest_player() {
            Some(target) => target.sub(ctx.position).planar_normalize().scale(ctx.speed),
            None => Vec3::ZERO,
        }
    }
}

/// Backs away from the nearest player while it is within the flee radius.
#[derive(Clone, Copy, Debug, Default)]
pub struct Retreat;

impl NpcBehavior for Retreat {
    fn intent(&self, ctx: &NpcContext<'_>, _rng: &mut DeterministicRng) -> Vec3 {
        match ctx.nearest_player() {
            Some(threat) if threat.planar_distance(ctx.position) < ctx.flee_radius => {
                ctx.position.sub(threat).planar_normalize().scale(ctx.speed)
            }
            _ => Vec3::ZERO,
        }
    }
}

/// Random walk: up to `jitter` units per tick on each axis.
#[derive(Clone, Copy, Debug, Default)]
pub struct Wander;

impl NpcBehavior for Wander {
    fn intent(&self, ctx: &NpcContext<'_>, rng: &mut DeterministicRng) -> Vec3 {
        // x is drawn before z.
        let dx = rng.next_centered(ctx.jitter);
        let dz = rng.next_centered(ctx.jitter);
        if ctx.dt > 0.0 {
            Vec3::new(dx / ctx.dt, 0.0, dz / ctx.dt)
        } else {
            Vec3::ZERO
        }
    }
}

/// Policy for a persona.
pub fn behavior_for(persona: Persona) -> &'static dyn NpcBehavior {
    match persona {
        Persona::Aggro => &Pursue,
        Persona::Cautious => &Retreat,
        Persona::Gambler => &Wander,
    }
}
