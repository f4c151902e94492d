//! Sliding along blocking surfaces.
//!
//! When a move is blocked the remaining delta is projected onto the hit
//! plane and tried again. A second blocking surface (a corner) either steers
//! the slide along the crease between the two planes or stops it.
//!
//! Ground movement adjusts the plane first: unwalkable slopes act like
//! vertical walls, and ceiling-like normals close to the floor are
//! flattened so a slide never pushes the capsule into the ground.

use glam::Vec3;

use super::context::MoveContext;
use crate::collision::HitResult;
use crate::math::{is_nearly_zero, project_onto_plane, safe_normal, KINDA_SMALL_NUMBER};

/// Push away from a wall hit twice in a row.
const SAME_WALL_NUDGE: f32 = 0.01;

/// Resolves blocked moves into slides.
pub trait SlideResolver {
    /// Slide the remaining `time` fraction of `delta` along `normal`.
    ///
    /// `hit` holds the blocking hit on entry and the last slide hit on exit.
    /// Returns the fraction of the slide that was applied.
    fn slide_along_surface(
        &self,
        ctx: &mut MoveContext<'_>,
        delta: Vec3,
        time: f32,
        normal: Vec3,
        hit: &mut HitResult,
        handle_impact: bool,
    ) -> f32;

    /// Delta that slides along `normal` for the given fraction of `delta`.
    fn compute_slide_vector(&self, ctx: &MoveContext<'_>, delta: Vec3, time: f32, normal: Vec3, hit: &HitResult) -> Vec3;

    /// Redirect `delta` after hitting a second surface with `hit`, the
    /// first one having had `old_hit_normal`.
    fn two_wall_adjust(&self, ctx: &MoveContext<'_>, delta: Vec3, hit: &HitResult, old_hit_normal: Vec3) -> Vec3;
}

/// Plane-projection sliding with ground and slope-boost corrections.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanarSlideResolver;

impl PlanarSlideResolver {
    /// Plane the slide should follow while on the ground.
    fn ground_slide_normal(&self, ctx: &MoveContext<'_>, delta: Vec3, normal: Vec3, hit: &HitResult) -> Vec3 {
        let up = ctx.up();
        let normal_up = normal.dot(up);

        if normal_up > 0.0 {
            // Do not get pushed up an unwalkable surface.
            if !ctx.is_walkable(hit) {
                return safe_normal(project_onto_plane(normal, up));
            }
        } else if normal_up < -KINDA_SMALL_NUMBER {
            // A hit on the upper part of the capsule must not push it into the floor.
            let floor = ctx.state.floor.current();
            if floor.floor_dist < ctx.config.min_floor_dist && floor.blocking_hit {
                let floor_normal = floor.hit.normal;
                let floor_opposes_move =
                    delta.dot(floor_normal) < 0.0 && floor_normal.dot(up) < 1.0 - 1.0e-5;
                let normal = if floor_opposes_move { floor_normal } else { normal };
                return safe_normal(project_onto_plane(normal, up));
            }
        }
        normal
    }

    /// Keep a falling slide from climbing higher than the original move.
    fn handle_slope_boosting(
        &self,
        ctx: &MoveContext<'_>,
        slide: Vec3,
        delta: Vec3,
        time: f32,
        normal: Vec3,
        hit: &HitResult,
    ) -> Vec3 {
        let up = ctx.up();
        let slide_up = slide.dot(up);
        if slide_up <= 0.0 {
            return slide;
        }

        let up_limit = delta.dot(up) * time;
        if slide_up - up_limit <= KINDA_SMALL_NUMBER {
            return slide;
        }

        let mut result = if up_limit > 0.0 {
            // Scale the whole vector; changing only the up part would steer
            // back into the surface.
            slide * (up_limit / slide_up)
        } else {
            // Heading down but deflected up: only keep the planar part.
            Vec3::ZERO
        };

        let remainder = project_onto_plane(slide - result, up);
        let planar_normal = safe_normal(project_onto_plane(normal, up));
        result += self.plane_slide(remainder, 1.0, planar_normal, hit);
        result
    }

    #[inline]
    fn plane_slide(&self, delta: Vec3, time: f32, normal: Vec3, _hit: &HitResult) -> Vec3 {
        project_onto_plane(delta, normal) * time
    }
}

impl SlideResolver for PlanarSlideResolver {
    fn slide_along_surface(
        &self,
        ctx: &mut MoveContext<'_>,
        delta: Vec3,
        time: f32,
        normal: Vec3,
        hit: &mut HitResult,
        handle_impact: bool,
    ) -> f32 {
        if !hit.blocking_hit {
            return 0.0;
        }

        let normal = if ctx.is_moving_on_ground() {
            self.ground_slide_normal(ctx, delta, normal, hit)
        } else {
            normal
        };

        let old_hit_normal = normal;
        let mut slide = self.compute_slide_vector(ctx, delta, time, normal, hit);
        if slide.dot(delta) <= 0.0 {
            return 0.0;
        }

        let rotation = ctx.rotation();
        *hit = ctx.safe_move(slide, rotation, true);
        let first_hit_percent = hit.time;
        let mut percent_applied = first_hit_percent;

        if hit.is_valid_blocking_hit() {
            if handle_impact {
                ctx.handle_impact(hit);
            }

            slide = self.two_wall_adjust(ctx, slide, hit, old_hit_normal);

            // Only continue when the new direction is significant and does
            // not reverse the original move.
            if !is_nearly_zero(slide, 1.0e-3) && slide.dot(delta) > 0.0 {
                *hit = ctx.safe_move(slide, rotation, true);
                percent_applied += hit.time * (1.0 - first_hit_percent);

                if handle_impact && hit.blocking_hit {
                    ctx.handle_impact(hit);
                }
            }
        }

        percent_applied.clamp(0.0, 1.0)
    }

    fn compute_slide_vector(&self, ctx: &MoveContext<'_>, delta: Vec3, time: f32, normal: Vec3, hit: &HitResult) -> Vec3 {
        let slide = self.plane_slide(delta, time, normal, hit);
        if ctx.is_falling() {
            self.handle_slope_boosting(ctx, slide, delta, time, normal, hit)
        } else {
            slide
        }
    }

    fn two_wall_adjust(&self, ctx: &MoveContext<'_>, delta: Vec3, hit: &HitResult, old_hit_normal: Vec3) -> Vec3 {
        let in_delta = delta;
        let hit_normal = hit.normal;
        let mut delta = delta;

        if old_hit_normal.dot(hit_normal) <= 0.0 {
            // A corner of 90 degrees or less: follow the crease.
            let desired = delta;
            let crease = safe_normal(hit_normal.cross(old_hit_normal));
            delta = crease * (delta.dot(crease) * (1.0 - hit.time));
            if desired.dot(delta) < 0.0 {
                delta = -delta;
            }
        } else {
            let desired = delta;
            delta = self.compute_slide_vector(ctx, delta, 1.0 - hit.time, hit_normal, hit);
            if delta.dot(desired) <= 0.0 {
                delta = Vec3::ZERO;
            } else if (hit_normal.dot(old_hit_normal) - 1.0).abs() < KINDA_SMALL_NUMBER {
                // Same wall again after sliding along it once.
                delta += hit_normal * SAME_WALL_NUDGE;
            }
        }

        if !ctx.is_moving_on_ground() {
            return delta;
        }

        let up = ctx.up();
        let delta_up = delta.dot(up);
        let normal_up = hit_normal.dot(up);
        if delta_up > 0.0 {
            // Slide up walkable surfaces only; the rest are walls.
            if (normal_up >= ctx.config.walkable_floor_z || ctx.is_walkable(hit)) && normal_up > KINDA_SMALL_NUMBER {
                let time = 1.0 - hit.time;
                let scaled_up = (safe_normal(delta) * in_delta.length()).dot(up);
                let planar = project_onto_plane(in_delta, up);
                delta = (planar + up * (scaled_up / normal_up)) * time;

                // Rather lose planar speed than rise above a step.
                let rise = delta.dot(up);
                if rise > ctx.config.max_step_height {
                    delta *= ctx.config.max_step_height / rise;
                }
            } else {
                delta = project_onto_plane(delta, up);
            }
        } else if delta_up < 0.0 {
            let floor = ctx.state.floor.current();
            if floor.floor_dist < ctx.config.min_floor_dist && floor.blocking_hit {
                delta = project_onto_plane(delta, up);
            }
        }
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{CollisionWorld, ContentFlags};
    use crate::movement::context::TestRig;
    use crate::movement::MovementMode;

    /// Wall face at x = 100.
    fn wall_world() -> CollisionWorld {
        let mut world = CollisionWorld::new();
        world.add_box(Vec3::new(150.0, 0.0, 0.0), Vec3::new(50.0, 1000.0, 1000.0), ContentFlags::SOLID);
        world
    }

    #[test]
    fn test_slide_along_wall() {
        let mut rig = TestRig::new(wall_world(), Vec3::new(0.0, 0.0, 0.0));
        rig.state.mode = MovementMode::Flying;
        let mut ctx = rig.ctx();
        let rotation = ctx.rotation();

        let delta = Vec3::new(100.0, 100.0, 0.0);
        let mut hit = ctx.safe_move(delta, rotation, true);
        assert!(hit.is_valid_blocking_hit());
        let y_before = ctx.location().y;

        let normal = hit.normal;
        let applied = ctx.slide_along_surface(delta, 1.0 - hit.time, normal, &mut hit, true);

        assert!(applied > 0.99, "Slide along a flat wall should complete, got {applied}");
        assert!(ctx.location().y > y_before + 30.0);
        assert!(ctx.location().x < 66.0, "Must not pass through the wall");
    }

    #[test]
    fn test_slide_rejects_reversing_delta() {
        let mut rig = TestRig::new(wall_world(), Vec3::ZERO);
        rig.state.mode = MovementMode::Flying;
        let mut ctx = rig.ctx();

        let mut hit = HitResult {
            blocking_hit: true,
            normal: Vec3::NEG_X,
            ..HitResult::default()
        };
        let before = ctx.location();
        let applied = ctx.slide_along_surface(Vec3::X * 50.0, 1.0, Vec3::NEG_X, &mut hit, false);
        assert_eq!(applied, 0.0);
        assert_eq!(ctx.location(), before);
    }

    #[test]
    fn test_falling_slide_does_not_boost_up_slope() {
        let mut rig = TestRig::new(CollisionWorld::new(), Vec3::ZERO);
        rig.state.mode = MovementMode::Falling;
        let ctx = rig.ctx();

        // Moving sideways and down into a 45 degree slope.
        let normal = Vec3::new(-1.0, 0.0, 1.0).normalize();
        let delta = Vec3::new(100.0, 0.0, -10.0);
        let slide = ctx.compute_slide_vector(delta, 1.0, normal, &HitResult::default());

        assert!(slide.z <= 1e-4, "Falling slide must not climb, got {slide}");
    }

    #[test]
    fn test_walking_unwalkable_slope_is_a_wall() {
        let mut rig = TestRig::new(CollisionWorld::new(), Vec3::ZERO);
        rig.state.mode = MovementMode::Walking;
        let ctx = rig.ctx();

        let steep = Vec3::new(-0.9, 0.0, 0.3).normalize();
        let hit = HitResult {
            blocking_hit: true,
            normal: steep,
            impact_normal: steep,
            ..HitResult::default()
        };
        let normal = PlanarSlideResolver.ground_slide_normal(&ctx, Vec3::X, steep, &hit);
        assert_eq!(normal.z, 0.0);
        assert!(normal.x < -0.99);
    }

    #[test]
    fn test_two_wall_corner_follows_crease() {
        let mut rig = TestRig::new(CollisionWorld::new(), Vec3::ZERO);
        rig.state.mode = MovementMode::Flying;
        let ctx = rig.ctx();

        let hit = HitResult {
            blocking_hit: true,
            time: 0.0,
            normal: Vec3::NEG_Y,
            ..HitResult::default()
        };
        let delta = Vec3::new(10.0, 10.0, 5.0);
        let adjusted = ctx.two_wall_adjust(delta, &hit, Vec3::NEG_X);

        // The crease between the two walls is the Z axis.
        assert!(adjusted.x.abs() < 1e-4 && adjusted.y.abs() < 1e-4);
        assert!((adjusted.z - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_two_wall_same_wall_nudges_away() {
        let mut rig = TestRig::new(CollisionWorld::new(), Vec3::ZERO);
        rig.state.mode = MovementMode::Flying;
        let ctx = rig.ctx();

        let hit = HitResult {
            blocking_hit: true,
            time: 0.5,
            normal: Vec3::NEG_X,
            ..HitResult::default()
        };
        let adjusted = ctx.two_wall_adjust(Vec3::new(10.0, 10.0, 0.0), &hit, Vec3::NEG_X);
        assert!((adjusted.y - 5.0).abs() < 1e-4);
        assert!((adjusted.x + SAME_WALL_NUDGE).abs() < 1e-6);
    }

    #[test]
    fn test_walking_two_wall_keeps_climb_below_step_height() {
        let mut rig = TestRig::new(CollisionWorld::new(), Vec3::ZERO);
        rig.state.mode = MovementMode::Walking;
        let ctx = rig.ctx();

        let ramp = Vec3::new(-0.5, 0.0, 0.866).normalize();
        let hit = HitResult {
            blocking_hit: true,
            time: 0.0,
            normal: ramp,
            impact_normal: ramp,
            ..HitResult::default()
        };
        let adjusted = ctx.two_wall_adjust(Vec3::new(1000.0, 0.0, 0.0), &hit, Vec3::new(-0.6, 0.0, 0.8));
        assert!(adjusted.z > 0.0);
        assert!(adjusted.z <= ctx.config.max_step_height + 1e-3);
    }
}
