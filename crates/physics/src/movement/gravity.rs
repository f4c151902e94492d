//! Gravity direction and magnitude.
//!
//! Gravity comes from one of two sources:
//!
//! - an ambient world gravity scalar acting along world Z, or
//! - a custom unit direction that overrides the axis while keeping the
//!   ambient magnitude.
//!
//! Both are scaled by a signed gravity scale. Direction and vector are
//! derived from the same terms, so they always agree.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::math::{non_zero_sign, rotation_between, safe_normal};

/// Up axes closer than this per component count as aligned.
const ALIGNED_TOLERANCE: f32 = 1.0e-5;

/// Resolves "down" for one character.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GravityModel {
    /// Unit override direction, or zero when using world Z.
    custom_direction: Vec3,
    /// Signed multiplier applied to the ambient magnitude.
    gravity_scale: f32,
    /// Ambient gravity along world Z (negative pulls toward -Z).
    world_gravity_z: f32,
    /// Normalized direction, refreshed whenever an input changes.
    direction: Vec3,
    /// Last non-zero direction, used when a caller cannot accept zero.
    last_axis: Vec3,
}

impl Default for GravityModel {
    fn default() -> Self {
        Self::new(-980.0, 1.0)
    }
}

impl GravityModel {
    pub fn new(world_gravity_z: f32, gravity_scale: f32) -> Self {
        let mut model = Self {
            custom_direction: Vec3::ZERO,
            gravity_scale,
            world_gravity_z,
            direction: Vec3::ZERO,
            last_axis: Vec3::NEG_Z,
        };
        model.refresh();
        model
    }

    /// Unit vector pointing "down".
    ///
    /// Returns zero when there is no gravity, unless `avoid_zero` is set, in
    /// which case the last known axis is returned instead.
    pub fn gravity_direction(&self, avoid_zero: bool) -> Vec3 {
        if self.direction == Vec3::ZERO && avoid_zero {
            self.last_axis
        } else {
            self.direction
        }
    }

    /// Override the gravity axis. A zero vector restores world Z.
    pub fn set_gravity_direction(&mut self, direction: Vec3) {
        self.custom_direction = safe_normal(direction);
        self.refresh();
    }

    /// The custom override, if one is set.
    pub fn custom_direction(&self) -> Option<Vec3> {
        (self.custom_direction != Vec3::ZERO).then_some(self.custom_direction)
    }

    /// Gravity acceleration vector used for integration.
    pub fn gravity_vector(&self) -> Vec3 {
        if self.custom_direction != Vec3::ZERO {
            self.custom_direction * (self.world_gravity_z.abs() * self.gravity_scale)
        } else {
            Vec3::new(0.0, 0.0, self.world_gravity_z * self.gravity_scale)
        }
    }

    /// Length of the gravity vector.
    pub fn gravity_magnitude(&self) -> f32 {
        self.gravity_vector().length()
    }

    pub fn gravity_scale(&self) -> f32 {
        self.gravity_scale
    }

    pub fn set_gravity_scale(&mut self, scale: f32) {
        self.gravity_scale = scale;
        self.refresh();
    }

    pub fn world_gravity_z(&self) -> f32 {
        self.world_gravity_z
    }

    pub fn set_world_gravity_z(&mut self, gravity_z: f32) {
        self.world_gravity_z = gravity_z;
        self.refresh();
    }

    /// Up axis a capsule should have under this gravity.
    pub fn desired_up(&self) -> Vec3 {
        -self.gravity_direction(true)
    }

    /// `current` turned along the shortest arc so its Z axis points against
    /// gravity, or `None` when it already does.
    ///
    /// Any difference is corrected, so small per-tick changes in direction
    /// cannot accumulate into drift.
    pub fn aligned_rotation(&self, current: Quat) -> Option<Quat> {
        let desired_up = self.desired_up();
        let current_up = (current * Vec3::Z).normalize();
        if current_up.abs_diff_eq(desired_up, ALIGNED_TOLERANCE) {
            return None;
        }
        Some((rotation_between(current_up, desired_up) * current).normalize())
    }

    fn refresh(&mut self) {
        self.direction = if self.custom_direction != Vec3::ZERO && self.gravity_scale != 0.0 {
            self.custom_direction * non_zero_sign(self.gravity_scale)
        } else if self.custom_direction == Vec3::ZERO && self.world_gravity_z * self.gravity_scale != 0.0 {
            Vec3::new(0.0, 0.0, non_zero_sign(self.world_gravity_z * self.gravity_scale))
        } else {
            Vec3::ZERO
        };

        if self.direction != Vec3::ZERO {
            self.last_axis = self.direction;
        } else if self.custom_direction != Vec3::ZERO {
            self.last_axis = self.custom_direction;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_points_down() {
        let gravity = GravityModel::default();
        assert_eq!(gravity.gravity_direction(false), Vec3::NEG_Z);
        assert_eq!(gravity.gravity_vector(), Vec3::new(0.0, 0.0, -980.0));
    }

    #[test]
    fn test_custom_direction_keeps_magnitude() {
        let mut gravity = GravityModel::default();
        gravity.set_gravity_direction(Vec3::new(2.0, 0.0, 0.0));

        assert_eq!(gravity.gravity_direction(false), Vec3::X);
        assert!((gravity.gravity_vector() - Vec3::new(980.0, 0.0, 0.0)).length() < 1e-3);
        assert_eq!(gravity.custom_direction(), Some(Vec3::X));
    }

    #[test]
    fn test_negative_scale_flips_direction_and_vector() {
        let mut gravity = GravityModel::default();
        gravity.set_gravity_direction(Vec3::NEG_Y);
        gravity.set_gravity_scale(-0.5);

        assert_eq!(gravity.gravity_direction(false), Vec3::Y);
        let v = gravity.gravity_vector();
        assert!(v.normalize().dot(gravity.gravity_direction(false)) > 0.9999, "Vector and direction must agree");
        assert!((v.length() - 490.0).abs() < 1e-3);
    }

    #[test]
    fn test_zero_gravity_signals_zero() {
        let mut gravity = GravityModel::default();
        gravity.set_world_gravity_z(0.0);

        assert_eq!(gravity.gravity_direction(false), Vec3::ZERO);
        assert_eq!(gravity.gravity_vector(), Vec3::ZERO);
        assert_eq!(gravity.gravity_direction(true), Vec3::NEG_Z, "Should fall back to the last axis");
    }

    #[test]
    fn test_zero_scale_with_custom_axis_avoids_zero() {
        let mut gravity = GravityModel::default();
        gravity.set_gravity_direction(Vec3::X);
        gravity.set_gravity_scale(0.0);

        assert_eq!(gravity.gravity_direction(false), Vec3::ZERO);
        assert_eq!(gravity.gravity_direction(true), Vec3::X);
    }

    #[test]
    fn test_clearing_override_restores_world_axis() {
        let mut gravity = GravityModel::default();
        gravity.set_gravity_direction(Vec3::X);
        gravity.set_gravity_direction(Vec3::ZERO);
        assert_eq!(gravity.custom_direction(), None);
        assert_eq!(gravity.gravity_direction(false), Vec3::NEG_Z);
    }

    #[test]
    fn test_aligned_rotation() {
        let mut gravity = GravityModel::default();
        assert!(gravity.aligned_rotation(Quat::IDENTITY).is_none());

        gravity.set_gravity_direction(Vec3::NEG_X);
        let rotation = gravity.aligned_rotation(Quat::IDENTITY).unwrap();
        assert!((rotation * Vec3::Z).dot(Vec3::X) > 0.9999, "Up should point along +X");
    }

    #[test]
    fn test_small_gravity_changes_are_followed() {
        let mut gravity = GravityModel::default();
        let mut rotation = Quat::IDENTITY;
        let step = 0.1_f32.to_radians();

        // Sweep gravity through 10 degrees in steps far below a degree.
        for i in 1..=100 {
            let angle = step * i as f32;
            gravity.set_gravity_direction(Vec3::new(angle.sin(), 0.0, -angle.cos()));
            rotation = gravity.aligned_rotation(rotation).expect("Every change should realign");
            assert!((rotation * Vec3::Z).abs_diff_eq(gravity.desired_up(), 1e-4));
        }
        assert!(gravity.aligned_rotation(rotation).is_none());
    }

    #[test]
    fn test_alignment_keeps_heading_on_shortest_arc() {
        let mut gravity = GravityModel::default();
        let heading = Quat::from_rotation_z(0.5);
        gravity.set_gravity_direction(Vec3::new(0.0, 0.1, -1.0));

        let rotation = gravity.aligned_rotation(heading).unwrap();
        let forward = rotation * Vec3::X;
        assert!(forward.dot(heading * Vec3::X) > 0.99, "Forward should barely change, got {forward}");
        assert!(forward.dot(rotation * Vec3::Z).abs() < 1e-5);
    }
}
