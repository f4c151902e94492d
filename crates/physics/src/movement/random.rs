//! Deterministic seeded random number generator.
//!
//! Uses xorshift32 so that replaying the same inputs gives the same moves.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Deterministic seeded random number generator using xorshift32 algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeededRandom {
    state: u32,
}

impl SeededRandom {
    /// Creates a new RNG with the given seed.
    /// Seed of 0 is treated as 1 to avoid degenerate sequence.
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    /// Returns the raw u32 value from the RNG.
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Returns a random float between 0 (inclusive) and 1 (exclusive).
    pub fn next(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Returns a random float in the range [min, max).
    pub fn next_range(&mut self, min: f32, max: f32) -> f32 {
        min + self.next() * (max - min)
    }

    /// Random direction in the plane perpendicular to the unit `axis`.
    ///
    /// Not normalized; each planar component lies in `[-0.5, 0.5)`.
    pub fn planar_direction(&mut self, axis: Vec3) -> Vec3 {
        let (x, y) = axis.any_orthonormal_pair();
        x * self.next_range(-0.5, 0.5) + y * self.next_range(-0.5, 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let mut a = SeededRandom::new(12345);
        let mut b = SeededRandom::new(12345);

        for _ in 0..100 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn test_zero_seed_is_usable() {
        let mut rng = SeededRandom::new(0);
        assert_ne!(rng.next_u32(), 0);
    }

    #[test]
    fn test_range() {
        let mut rng = SeededRandom::new(42);
        for _ in 0..1000 {
            let v = rng.next();
            assert!((0.0..1.0).contains(&v));
            let r = rng.next_range(-0.5, 0.5);
            assert!((-0.5..0.5).contains(&r));
        }
    }

    #[test]
    fn test_planar_direction_is_perpendicular() {
        let mut rng = SeededRandom::new(7);
        let axis = Vec3::new(1.0, 1.0, 0.0).normalize();
        for _ in 0..20 {
            let dir = rng.planar_direction(axis);
            assert!(dir.dot(axis).abs() < 1e-5);
        }
    }
}
