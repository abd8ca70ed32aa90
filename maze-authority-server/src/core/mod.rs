//! Core deterministic primitives.
//!
//! Everything a client needs to reproduce bit-for-bit from a seed lives here:
//! the PRNG and the hash functions that fingerprint layouts and paths.

pub mod rng;
pub mod hash;
pub mod vec3;

// Re-export core types
pub use rng::{DeterministicRng, seed_from_hex};
pub use hash::{derive_seed, hash_layout, hash_path};
pub use vec3::Vec3;
