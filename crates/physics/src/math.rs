//! Vector helpers and engine tolerances shared by collision and movement.
//!
//! Every routine here is axis-agnostic: nothing assumes that "up" is world Z.
//! Callers pass the capsule up axis (or the gravity direction) explicitly.

use glam::{Quat, Vec3};

/// Tolerance for "close enough to zero" in gameplay units.
pub const KINDA_SMALL_NUMBER: f32 = 1.0e-4;

/// Tolerance for "numerically zero".
pub const SMALL_NUMBER: f32 = 1.0e-8;

/// Shortest sub-step the simulation will run.
pub const MIN_TICK_TIME: f32 = 1.0e-6;

/// Cosine above which two unit normals are treated as parallel.
pub const THRESH_NORMALS_ARE_PARALLEL: f32 = 0.999_845;

/// Up-axis alignment below which a surface counts as a vertical wall.
pub const VERTICAL_SLOPE_NORMAL_Z: f32 = 0.001;

/// Up-axis alignment of a side hit that still allows a step up.
pub const MAX_STEP_SIDE_Z: f32 = 0.08;

/// Distance a blocked sweep backs off from the surface it hit.
pub const SWEEP_PULLBACK: f32 = 0.1;

/// Remove the component of `v` along the unit `normal`.
#[inline]
pub fn project_onto_plane(v: Vec3, normal: Vec3) -> Vec3 {
    v - normal * v.dot(normal)
}

/// Component of `v` along the unit `axis`, as a vector.
#[inline]
pub fn project_onto_axis(v: Vec3, axis: Vec3) -> Vec3 {
    axis * v.dot(axis)
}

/// Normalize, returning zero for vectors too short to have a direction.
#[inline]
pub fn safe_normal(v: Vec3) -> Vec3 {
    let len_sq = v.length_squared();
    if len_sq <= SMALL_NUMBER {
        Vec3::ZERO
    } else {
        v / len_sq.sqrt()
    }
}

/// Clamp the length of `v` to `max`.
#[inline]
pub fn clamp_to_max_size(v: Vec3, max: f32) -> Vec3 {
    if max < KINDA_SMALL_NUMBER {
        return Vec3::ZERO;
    }
    let len_sq = v.length_squared();
    if len_sq > max * max {
        v * (max / len_sq.sqrt())
    } else {
        v
    }
}

/// True when every component magnitude is within `tolerance`.
#[inline]
pub fn is_nearly_zero(v: Vec3, tolerance: f32) -> bool {
    v.abs().max_element() <= tolerance
}

/// Equality within `tolerance` per component.
#[inline]
pub fn nearly_equal(a: Vec3, b: Vec3, tolerance: f32) -> bool {
    is_nearly_zero(a - b, tolerance)
}

/// Sign of `x`, treating zero as positive.
#[inline]
pub fn non_zero_sign(x: f32) -> f32 {
    if x >= 0.0 {
        1.0
    } else {
        -1.0
    }
}

/// Rotation that takes unit vector `from` onto unit vector `to` along the
/// shortest arc.
#[inline]
pub fn rotation_between(from: Vec3, to: Vec3) -> Quat {
    Quat::from_rotation_arc(from, to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_onto_plane_removes_normal_component() {
        let v = Vec3::new(3.0, 4.0, 5.0);
        let p = project_onto_plane(v, Vec3::Z);
        assert_eq!(p, Vec3::new(3.0, 4.0, 0.0));
        assert!(p.dot(Vec3::Z).abs() < SMALL_NUMBER);
    }

    #[test]
    fn test_clamp_to_max_size() {
        let v = Vec3::new(300.0, 400.0, 0.0);
        let clamped = clamp_to_max_size(v, 100.0);
        assert!((clamped.length() - 100.0).abs() < 1e-3);
        assert_eq!(clamp_to_max_size(Vec3::X, 100.0), Vec3::X);
        assert_eq!(clamp_to_max_size(v, 0.0), Vec3::ZERO);
    }

    #[test]
    fn test_safe_normal_zero() {
        assert_eq!(safe_normal(Vec3::ZERO), Vec3::ZERO);
        assert_eq!(safe_normal(Vec3::new(0.0, 0.0, -5.0)), Vec3::NEG_Z);
    }
}
