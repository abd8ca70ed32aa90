//! 3D Vector
//!
//! World positions and velocities. `x` and `z` span the maze floor, `y` is
//! vertical and ignored by collision. On the wire a vector is a plain
//! `[x, y, z]` array.

use serde::{Deserialize, Serialize};

/// A 3D vector of `f64` components.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Vec3 {
    /// East-west axis (maze column).
    pub x: f64,
    /// Vertical axis.
    pub y: f64,
    /// North-south axis (maze row).
    pub z: f64,
}

impl Vec3 {
    /// Zero vector.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    /// Create a new vector.
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Component-wise addition.
    #[inline]
    pub fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    /// Component-wise subtraction.
    #[inline]
    pub fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    /// Multiply every component by a scalar.
    #[inline]
    pub fn scale(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor)
    }

    /// Length on the floor plane (ignores `y`).
    #[inline]
    pub fn planar_length(self) -> f64 {
        self.x.hypot(self.z)
    }

    /// Distance on the floor plane (ignores `y`).
    #[inline]
    pub fn planar_distance(self, other: Self) -> f64 {
        self.sub(other).planar_length()
    }

    /// Unit vector on the floor plane, or zero if the planar length is zero.
    pub fn planar_normalize(self) -> Self {
        let len = self.planar_length();
        if len > 0.0 {
            Self::new(self.x / len, 0.0, self.z / len)
        } else {
            Self::ZERO
        }
    }

    /// True when either floor-plane component is non-zero.
    #[inline]
    pub fn is_moving(self) -> bool {
        self.x != 0.0 || self.z != 0.0
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Vec3> for [f64; 3] {
    fn from(v: Vec3) -> Self {
        [v.x, v.y, v.z]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_form_is_array() {
        let v = Vec3::new(1.5, 0.0, -2.25);
        assert_eq!(serde_json::to_string(&v).unwrap(), "[1.5,0.0,-2.25]");
        let parsed: Vec3 = serde_json::from_str("[1, 2, 3]").unwrap();
        assert_eq!(parsed, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_planar_ignores_vertical() {
        let a = Vec3::new(0.0, 100.0, 0.0);
        let b = Vec3::new(3.0, -7.0, 4.0);
        assert!((a.planar_distance(b) - 5.0).abs() < 1e-12);

        let n = Vec3::new(3.0, 9.0, 4.0).planar_normalize();
        assert!((n.planar_length() - 1.0).abs() < 1e-12);
        assert_eq!(n.y, 0.0);
        assert_eq!(Vec3::ZERO.planar_normalize(), Vec3::ZERO);
    }

    #[test]
    fn test_is_moving() {
        assert!(!Vec3::new(0.0, 5.0, 0.0).is_moving());
        assert!(Vec3::new(0.0, 0.0, -0.1).is_moving());
    }
}
