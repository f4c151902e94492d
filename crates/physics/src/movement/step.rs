//! Climbing over low obstacles.
//!
//! A step is three sweeps made inside one transform batch: up, forward and
//! back down. The landing is validated afterwards, and any rejection reverts
//! the batch so a failed step leaves the capsule exactly where it was.

use glam::Vec3;

use super::context::MoveContext;
use super::floor::FloorResult;
use super::state::MovementFlags;
use crate::collision::HitResult;
use crate::math::MAX_STEP_SIDE_Z;

/// Slack on the height check so a step exactly at the limit is accepted.
const STEP_HEIGHT_TOLERANCE: f32 = 1.0e-3;

/// Floor found by the final downward sweep of a successful step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepDownResult {
    /// `floor` holds a fresh floor query.
    pub computed_floor: bool,
    pub floor: FloorResult,
}

/// Decides whether and how a character climbs onto an obstacle.
pub trait StepClimber {
    /// Whether `hit` is something the character may step onto.
    fn can_step_up(&self, ctx: &MoveContext<'_>, hit: &HitResult) -> bool;

    /// Try to climb over `hit` while moving by `delta`.
    ///
    /// On success the capsule stands on top of the obstacle and, when
    /// `step_down` is given, the landing floor is written to it. On failure
    /// the capsule transform is unchanged.
    fn step_up(
        &self,
        ctx: &mut MoveContext<'_>,
        gravity_direction: Vec3,
        delta: Vec3,
        hit: &HitResult,
        step_down: Option<&mut StepDownResult>,
    ) -> bool;
}

/// Up, forward, down step sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepStepClimber;

impl StepClimber for SweepStepClimber {
    fn can_step_up(&self, ctx: &MoveContext<'_>, hit: &HitResult) -> bool {
        if !hit.is_valid_blocking_hit() || !ctx.has_valid_data() || ctx.is_falling() {
            return false;
        }
        hit.surface.can_step_up() && hit.surface.can_be_base()
    }

    fn step_up(
        &self,
        ctx: &mut MoveContext<'_>,
        gravity_direction: Vec3,
        delta: Vec3,
        hit: &HitResult,
        step_down: Option<&mut StepDownResult>,
    ) -> bool {
        let max_step_height = ctx.config.max_step_height;
        if max_step_height <= 0.0 || !self.can_step_up(ctx, hit) {
            return false;
        }

        let old_location = ctx.location();
        let capsule = ctx.capsule();
        let down = -ctx.up();

        // Only impacts on the lower part of the capsule can be stepped over.
        let bottom = old_location + down * capsule.half_height;
        let top = old_location - down * capsule.segment_half_height();
        let segment = top - bottom;
        let alpha = (hit.impact_point - bottom).dot(segment) / segment.length_squared();
        // Impacts level with the capsule bottom are the floor itself.
        let min_alpha = STEP_HEIGHT_TOLERANCE / segment.length();
        if alpha > 1.0 || alpha <= min_alpha {
            log::trace!("step up rejected: impact at {alpha:.3} along the capsule");
            return false;
        }

        let step_side_z = -hit.impact_normal.dot(gravity_direction);
        let mut travel_up = max_step_height;
        let mut travel_down = max_step_height;
        let mut floor_point = bottom;

        let floor = *ctx.state.floor.current();
        if ctx.is_moving_on_ground() && floor.is_walkable_floor() {
            // The step height is measured from the floor, not from the
            // hovering capsule. Rising one clearance band higher lets a step
            // exactly at the limit be cleared; the landing check still caps
            // the height gained.
            let floor_dist = floor.floor_dist.max(0.0);
            travel_up = (max_step_height - floor_dist).max(0.0) + ctx.config.max_floor_dist;
            travel_down = max_step_height + ctx.config.max_floor_dist * 3.0;

            let hit_vertical_face = !ctx.is_within_edge_tolerance(hit.location, hit.impact_point, capsule.radius);
            floor_point = if !floor.line_trace && !hit_vertical_face {
                floor.hit.impact_point
            } else {
                bottom + down * floor.floor_dist
            };
        }

        let batch = ctx.state.body.begin_batch();
        let rotation = ctx.rotation();

        let sweep_up = ctx.safe_move(-gravity_direction * travel_up, rotation, true);
        let mut sweep = ctx.safe_move(delta, rotation, true);

        if sweep_up.blocking_hit && sweep.blocking_hit {
            ctx.handle_impact(&sweep_up);
        }

        if sweep.blocking_hit {
            if sweep.start_penetrating {
                ctx.state.body.revert(batch);
                log::trace!("step up rejected: forward sweep started penetrating");
                return false;
            }

            ctx.handle_impact(&sweep);
            if ctx.is_falling() {
                ctx.state.body.commit(batch);
                return true;
            }

            let forward_time = sweep.time;
            let normal = sweep.normal;
            let slide = ctx.slide_along_surface(delta, 1.0 - forward_time, normal, &mut sweep, true);

            if ctx.is_falling() {
                ctx.state.body.revert(batch);
                return false;
            }
            if forward_time == 0.0 && slide == 0.0 {
                ctx.state.body.revert(batch);
                log::trace!("step up rejected: no forward progress");
                return false;
            }
        }

        let rotation = ctx.rotation();
        let sweep = ctx.safe_move(gravity_direction * travel_down, rotation, true);
        if sweep.start_penetrating {
            ctx.state.body.revert(batch);
            log::trace!("step up rejected: downward sweep started penetrating");
            return false;
        }

        let mut result = StepDownResult::default();
        if sweep.is_valid_blocking_hit() {
            let height_gained = (floor_point - sweep.impact_point).dot(down);
            if height_gained > max_step_height + STEP_HEIGHT_TOLERANCE {
                ctx.state.body.revert(batch);
                log::debug!("step up rejected: {height_gained:.2} exceeds max step height {max_step_height:.2}");
                return false;
            }

            if !ctx.is_walkable(&sweep) {
                // Unwalkable landings may not face the move or end up higher.
                if delta.dot(sweep.impact_normal) < 0.0 {
                    ctx.state.body.revert(batch);
                    return false;
                }
                if (old_location - sweep.location).dot(down) > 0.0 {
                    ctx.state.body.revert(batch);
                    return false;
                }
            }

            if !ctx.is_within_edge_tolerance(sweep.location, sweep.impact_point, capsule.radius) {
                ctx.state.body.revert(batch);
                log::trace!("step up rejected: landing too close to the capsule rim");
                return false;
            }

            if height_gained > 0.0 && !self.can_step_up(ctx, &sweep) {
                ctx.state.body.revert(batch);
                return false;
            }

            if step_down.is_some() {
                let location = ctx.location();
                result.floor = ctx.find_floor(location, false, Some(&sweep));

                // A real step with nothing to perch on: slide along it instead.
                if (old_location - sweep.location).dot(down) > 0.0
                    && !result.floor.blocking_hit
                    && step_side_z < MAX_STEP_SIDE_Z
                {
                    ctx.state.body.revert(batch);
                    return false;
                }
                result.computed_floor = true;
            }
        }

        if let Some(out) = step_down {
            *out = result;
        }

        ctx.state.body.commit(batch);
        if !ctx.config.maintain_horizontal_ground_velocity {
            ctx.state.flags.set(MovementFlags::JUST_TELEPORTED, true);
        }
        log::trace!("stepped up from {old_location} to {}", ctx.location());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{CollisionWorld, ContentFlags, SurfaceFlags, SurfaceProperties};
    use crate::movement::context::TestRig;
    use crate::movement::MovementMode;

    /// Floor at z = 0 and a step of `height` whose face is at x = 100.
    fn step_world(height: f32) -> (CollisionWorld, u32) {
        let mut world = CollisionWorld::new();
        world.add_box(Vec3::new(0.0, 0.0, -50.0), Vec3::new(5000.0, 5000.0, 50.0), ContentFlags::SOLID);
        let step = world.add_box(
            Vec3::new(350.0, 0.0, height * 0.5),
            Vec3::new(250.0, 500.0, height * 0.5),
            ContentFlags::SOLID,
        );
        (world, step)
    }

    fn walking_rig(world: CollisionWorld) -> TestRig {
        let mut rig = TestRig::new(world, Vec3::new(0.0, 0.0, 91.0));
        rig.ctx().set_movement_mode(MovementMode::Walking);
        assert!(rig.state.floor.current().is_walkable_floor());
        rig
    }

    fn walk_into_step(ctx: &mut MoveContext<'_>) -> HitResult {
        let rotation = ctx.rotation();
        let hit = ctx.safe_move(Vec3::X * 100.0, rotation, true);
        assert!(hit.is_valid_blocking_hit(), "Should run into the step");
        hit
    }

    #[test]
    fn test_steps_onto_low_obstacle() {
        let (world, _) = step_world(44.0);
        let mut rig = walking_rig(world);
        let mut ctx = rig.ctx();
        let hit = walk_into_step(&mut ctx);
        let before = ctx.location();

        let mut step_down = StepDownResult::default();
        let down = -ctx.up();
        let stepped = ctx.step_up(down, Vec3::X * 60.0, &hit, Some(&mut step_down));

        assert!(stepped);
        let bottom = ctx.location().z - 88.0;
        assert!((bottom - 44.0).abs() < 0.5, "Should rest on the step top, bottom at {bottom}");
        assert!(ctx.location().z - before.z <= 45.0);
        assert!(ctx.location().x > 100.0);
        assert!(step_down.computed_floor);
        assert!(step_down.floor.is_walkable_floor());
    }

    #[test]
    fn test_step_at_max_height_succeeds() {
        let (world, _) = step_world(45.0);
        let mut rig = walking_rig(world);
        let mut ctx = rig.ctx();
        let hit = walk_into_step(&mut ctx);
        let down = -ctx.up();

        assert!(ctx.step_up(down, Vec3::X * 60.0, &hit, None));
        assert!((ctx.location().z - 88.0 - 45.0).abs() < 0.5);
    }

    #[test]
    fn test_too_high_step_reverts_exactly() {
        let (world, _) = step_world(46.0);
        let mut rig = walking_rig(world);
        let mut ctx = rig.ctx();
        let hit = walk_into_step(&mut ctx);
        let before = ctx.state.body.transform();
        let committed = ctx.state.body.committed();

        let down = -ctx.up();
        assert!(!ctx.step_up(down, Vec3::X * 60.0, &hit, None));

        assert_eq!(ctx.state.body.transform(), before);
        assert_eq!(ctx.state.body.committed(), committed);
        assert!(!ctx.state.body.is_batching());
    }

    #[test]
    fn test_no_step_up_surface() {
        let (mut world, step) = step_world(20.0);
        world.set_surface(
            step,
            SurfaceProperties {
                flags: SurfaceFlags::NO_STEP_UP,
                ..Default::default()
            },
        );
        let mut rig = walking_rig(world);
        let mut ctx = rig.ctx();
        let hit = walk_into_step(&mut ctx);
        assert!(!ctx.can_step_up(&hit));
        let down = -ctx.up();
        assert!(!ctx.step_up(down, Vec3::X * 60.0, &hit, None));
    }

    #[test]
    fn test_cannot_step_while_falling() {
        let (world, _) = step_world(20.0);
        let mut rig = walking_rig(world);
        let mut ctx = rig.ctx();
        let hit = walk_into_step(&mut ctx);
        ctx.state.mode = MovementMode::Falling;
        assert!(!ctx.can_step_up(&hit));
    }

    #[test]
    fn test_impact_above_capsule_segment_is_rejected() {
        let (world, _) = step_world(20.0);
        let mut rig = walking_rig(world);
        let mut ctx = rig.ctx();
        let mut hit = walk_into_step(&mut ctx);
        hit.impact_point = ctx.location() + Vec3::new(34.0, 0.0, 80.0);
        let down = -ctx.up();
        let before = ctx.state.body.transform();
        assert!(!ctx.step_up(down, Vec3::X * 60.0, &hit, None));
        assert_eq!(ctx.state.body.transform(), before);
    }

    #[test]
    fn test_impact_at_capsule_bottom_is_not_a_step() {
        let (world, _) = step_world(20.0);
        let mut rig = walking_rig(world);
        let mut ctx = rig.ctx();
        let mut hit = walk_into_step(&mut ctx);
        hit.impact_point = ctx.location() + Vec3::new(10.0, 0.0, -88.0 + 1.0e-4);
        let down = -ctx.up();
        let before = ctx.state.body.transform();
        assert!(!ctx.step_up(down, Vec3::X * 60.0, &hit, None));
        assert_eq!(ctx.state.body.transform(), before);
    }
}
