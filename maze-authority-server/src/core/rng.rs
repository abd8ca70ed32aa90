//! Deterministic Random Number Generator
//!
//! Uses the Mulberry32 algorithm: a single 32-bit state word, cheap enough to
//! be re-implemented bit-for-bit by any client that needs to rebuild a maze
//! from its seed. Given the same seed, produces identical sequence on all
//! platforms.

use serde::{Deserialize, Serialize};

/// Increment applied to the state word on every draw.
const MULBERRY_INCREMENT: u32 = 0x6D2B_79F5;

/// 2^32 as a float, for mapping a draw onto `[0, 1)`.
const TWO_POW_32: f64 = 4_294_967_296.0;

/// Deterministic PRNG using the Mulberry32 algorithm.
///
/// # Determinism Guarantee
///
/// Given the same seed, this RNG will produce the exact same sequence
/// of random numbers on any platform, including the browser client which
/// runs the same algorithm over JavaScript numbers.
///
/// # Example
///
/// ```
/// use maze_authority::core::rng::DeterministicRng;
///
/// let mut rng = DeterministicRng::new(42);
/// assert_eq!(rng.next_u32(), 2581720956); // Always the same!
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: u32,
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 32-bit seed.
    pub const fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Create an RNG from a hex seed string.
    ///
    /// Only the first 8 hexadecimal characters participate (see
    /// [`seed_from_hex`]).
    pub fn from_hex_seed(seed: &str) -> Self {
        Self::new(seed_from_hex(seed))
    }

    /// Generate the next 32-bit random value.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(MULBERRY_INCREMENT);
        let t = self.state;
        let mut r = (t ^ (t >> 15)).wrapping_mul(1 | t);
        r ^= r.wrapping_add((r ^ (r >> 7)).wrapping_mul(61 | r));
        r ^ (r >> 14)
    }

    /// Generate a random float in `[0, 1)`.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / TWO_POW_32
    }

    /// Generate a random index in `[0, len)`.
    ///
    /// Equal to `floor(next_f64() * len)` computed in integer arithmetic, so
    /// the result never depends on float rounding.
    #[inline]
    pub fn next_index(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let draw = u64::from(self.next_u32());
        ((draw * len as u64) >> 32) as usize
    }

    /// Generate a random float in `[-half_width, half_width)`.
    #[inline]
    pub fn next_centered(&mut self, half_width: f64) -> f64 {
        (self.next_f64() - 0.5) * 2.0 * half_width
    }

    /// Select a random element from a slice.
    pub fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        if slice.is_empty() {
            None
        } else {
            let idx = self.next_index(slice.len());
            slice.get(idx)
        }
    }

    /// Get current state (for checkpointing/debugging).
    pub fn state(&self) -> u32 {
        self.state
    }

    /// Restore from saved state.
    pub fn set_state(&mut self, state: u32) {
        self.state = state;
    }
}

/// Parse the leading 32 bits of a hex seed string.
///
/// Takes at most the first 8 characters and parses the longest valid
/// hexadecimal prefix of them. A seed with no leading hex digit yields 0,
/// so any string is accepted.
pub fn seed_from_hex(seed: &str) -> u32 {
    seed.chars()
        .take(8)
        .map_while(|c| c.to_digit(16))
        .fold(0u32, |acc, digit| (acc << 4) | digit)
}

// =============================================================================
// TESTS
// =============================================================================
