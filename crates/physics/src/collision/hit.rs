//! Hit results reported by sweeps and line traces.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::flags::{ContentFlags, SurfaceProperties};

/// Identifier of a body in a collision world.
pub type BodyId = u32;

/// Result of a sweep or line trace through the world.
///
/// A sweep moves a shape from `trace_start` to `trace_end` and reports the
/// first blocking body along the way.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitResult {
    /// Whether a blocking body was hit.
    pub blocking_hit: bool,

    /// Whether the shape already overlapped the hit body at the start.
    ///
    /// When true, `normal` is the direction that pushes the shape out and
    /// `penetration_depth` how far it has to go.
    pub start_penetrating: bool,

    /// How far along the trace we got before hitting something.
    ///
    /// - `1.0` = traveled the full distance (no collision)
    /// - `0.0` = blocked immediately at start
    pub time: f32,

    /// Distance from `trace_start` to `location`.
    pub distance: f32,

    /// Location of the swept shape at `time`.
    ///
    /// Backed off slightly from the impact so the next query does not start
    /// touching the surface.
    pub location: Vec3,

    /// World point where the shapes touched.
    pub impact_point: Vec3,

    /// Normal of the swept shape at the impact, pointing away from the hit body.
    pub normal: Vec3,

    /// Face normal of the hit body at the impact point.
    ///
    /// For sweeps that clip an edge this is the face most opposed to the
    /// sweep direction, which can differ from `normal`.
    pub impact_normal: Vec3,

    pub trace_start: Vec3,
    pub trace_end: Vec3,

    /// Penetration depth when `start_penetrating` is set.
    pub penetration_depth: f32,

    /// Body that was hit.
    pub body: Option<BodyId>,

    /// Content flags of what was hit.
    pub contents: ContentFlags,

    /// Movement-relevant properties of the hit surface.
    pub surface: SurfaceProperties,
}

impl Default for HitResult {
    fn default() -> Self {
        Self::no_hit(Vec3::ZERO, Vec3::ZERO)
    }
}

impl HitResult {
    /// A trace from `start` to `end` that hit nothing.
    pub fn no_hit(start: Vec3, end: Vec3) -> Self {
        Self {
            blocking_hit: false,
            start_penetrating: false,
            time: 1.0,
            distance: (end - start).length(),
            location: end,
            impact_point: end,
            normal: Vec3::ZERO,
            impact_normal: Vec3::ZERO,
            trace_start: start,
            trace_end: end,
            penetration_depth: 0.0,
            body: None,
            contents: ContentFlags::EMPTY,
            surface: SurfaceProperties::default(),
        }
    }

    /// Blocking hit that did not start in penetration.
    #[inline]
    pub fn is_valid_blocking_hit(&self) -> bool {
        self.blocking_hit && !self.start_penetrating
    }

    /// Clear the hit while keeping the trace endpoints.
    pub fn reset(&mut self, time: f32) {
        *self = Self {
            time,
            ..Self::no_hit(self.trace_start, self.trace_end)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_hit_travels_full_distance() {
        let hit = HitResult::no_hit(Vec3::ZERO, Vec3::new(3.0, 4.0, 0.0));
        assert!(!hit.blocking_hit);
        assert_eq!(hit.time, 1.0);
        assert_eq!(hit.distance, 5.0);
        assert_eq!(hit.location, Vec3::new(3.0, 4.0, 0.0));
        assert!(!hit.is_valid_blocking_hit());
    }

    #[test]
    fn test_penetrating_hit_is_not_valid() {
        let hit = HitResult {
            blocking_hit: true,
            start_penetrating: true,
            ..HitResult::default()
        };
        assert!(!hit.is_valid_blocking_hit());
    }

    #[test]
    fn test_reset_keeps_trace() {
        let mut hit = HitResult {
            blocking_hit: true,
            time: 0.25,
            body: Some(3),
            ..HitResult::no_hit(Vec3::ZERO, Vec3::X)
        };
        hit.reset(1.0);
        assert!(!hit.blocking_hit);
        assert_eq!(hit.body, None);
        assert_eq!(hit.trace_end, Vec3::X);
        assert_eq!(hit.time, 1.0);
    }
}
