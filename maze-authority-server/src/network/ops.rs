//! Operational Controls
//!
//! Chaos knobs applied to inbound input (injected latency and a random
//! drop percentage) and the plain counters served at `/metrics`.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

// =============================================================================
// CHAOS KNOBS
// =============================================================================

/// Current chaos settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChaosKnobs {
    /// Delay before each input is handled (ms)
    pub inject_latency_ms: u64,
    /// Percentage of inputs dropped before handling, 0 to 100
    pub drop_pct: f64,
}

impl ChaosKnobs {
    /// Build knobs from raw values; missing values reset to zero.
    ///
    /// Latency is truncated to whole milliseconds. Non-finite values count
    /// as zero and the drop percentage is clamped to `0..=100`.
    pub fn from_update(inject_latency_ms: Option<f64>, drop_pct: Option<f64>) -> Self {
        let finite = |v: Option<f64>| v.filter(|v| v.is_finite()).unwrap_or(0.0);
        Self {
            inject_latency_ms: finite(inject_latency_ms).max(0.0) as u64,
            drop_pct: finite(drop_pct).clamp(0.0, 100.0),
        }
    }

    /// Injected latency as a duration.
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.inject_latency_ms)
    }

    /// Sample whether one input is dropped.
    pub fn should_drop<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        self.drop_pct > 0.0 && rng.gen::<f64>() * 100.0 < self.drop_pct
    }
}

/// Process-wide chaos settings shared by every connection.
#[derive(Debug, Default)]
pub struct ChaosControl {
    knobs: RwLock<ChaosKnobs>,
}

impl ChaosControl {
    /// All knobs off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current settings.
    pub async fn get(&self) -> ChaosKnobs {
        *self.knobs.read().await
    }

    /// Replace the settings.
    pub async fn set(&self, knobs: ChaosKnobs) {
        *self.knobs.write().await = knobs;
    }

    /// Delay by the injected latency, then decide whether to drop.
    ///
    /// Returns `true` when the input should be handled.
    pub async fn admit(&self) -> bool {
        let knobs = self.get().await;
        if knobs.inject_latency_ms > 0 {
            tokio::time::sleep(knobs.latency()).await;
        }
        !knobs.should_drop(&mut rand::thread_rng())
    }
}

// =============================================================================
// METRICS
// =============================================================================

/// Monotonic server counters.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Connections accepted
    pub connections_total: AtomicU64,
    /// Room ticks run
    pub ticks_total: AtomicU64,
    /// Inputs applied
    pub inputs_applied: AtomicU64,
    /// Inputs ignored as duplicates or out of order
    pub inputs_stale: AtomicU64,
    /// Frames rejected by validation
    pub inputs_invalid: AtomicU64,
    /// Inputs dropped by the chaos knob
    pub inputs_dropped: AtomicU64,
    /// Protocol violations seen
    pub protocol_violations: AtomicU64,
    /// Connections closed for too many violations
    pub violation_disconnects: AtomicU64,
    /// Rooms evicted for idleness
    pub rooms_evicted: AtomicU64,
}

impl Metrics {
    /// Add one to `counter`.
    #[inline]
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Plain-text exposition with the current room and connection gauges.
    pub fn render(&self, rooms: usize, connections: usize) -> String {
        let counters = [
            ("maze_connections_total", &self.connections_total),
            ("maze_ticks_total", &self.ticks_total),
            ("maze_inputs_applied_total", &self.inputs_applied),
            ("maze_inputs_stale_total", &self.inputs_stale),
            ("maze_inputs_invalid_total", &self.inputs_invalid),
            ("maze_inputs_dropped_total", &self.inputs_dropped),
            ("maze_protocol_violations_total", &self.protocol_violations),
            ("maze_violation_disconnects_total", &self.violation_disconnects),
            ("maze_rooms_evicted_total", &self.rooms_evicted),
        ];

        let mut out = String::new();
        let _ = writeln!(out, "maze_rooms {rooms}");
        let _ = writeln!(out, "maze_connections {connections}");
        for (name, counter) in counters {
            let _ = writeln!(out, "{name} {}", counter.load(Ordering::Relaxed));
        }
        out
    }
}
