//! Walking on a floor.

use glam::{Quat, Vec3};

use super::MovementPhysics;
use crate::collision::{BaseTransform, BodyId, HitResult, SurfaceFlags};
use crate::error::{ensure_finite, LocomotionError};
use crate::math::{is_nearly_zero, project_onto_plane, safe_normal, KINDA_SMALL_NUMBER, MIN_TICK_TIME};
use crate::movement::context::{MoveContext, SimulationStep};
use crate::movement::floor::FloorResult;
use crate::movement::state::{MovementFlags, MovementMode};
use crate::movement::step::StepDownResult;

/// Floor-following movement with step-up, slides and ledge handling.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkingPhysics;

impl MovementPhysics for WalkingPhysics {
    fn simulate(&self, ctx: &mut MoveContext<'_>, delta_time: f32, iterations: u32) -> Result<(), LocomotionError> {
        if delta_time < MIN_TICK_TIME {
            return Ok(());
        }
        if !ctx.state.body.collision_enabled {
            log::trace!("walking without collision does not move");
            return Ok(());
        }
        ensure_finite(ctx.state.velocity, "walking")?;

        ctx.state.flags.set(MovementFlags::JUST_TELEPORTED, false);
        let mut checked_fall = false;
        let mut tried_ledge_move = false;
        let mut step = SimulationStep::new(delta_time, iterations);

        while step.has_time(ctx.config) {
            let time_tick = step.advance(ctx.config);
            ctx.state.flags.set(MovementFlags::JUST_TELEPORTED, false);

            let old_base = ctx.state.base.base;
            let previous_base_transform = old_base.and_then(|base| ctx.world.base_transform(base));
            let old_location = ctx.location();
            let old_floor = *ctx.state.floor.current();

            ctx.maintain_horizontal_ground_velocity();
            let old_velocity = ctx.state.velocity;

            if !ctx.state.has_root_motion() {
                let friction = ctx.ground_friction();
                let braking = ctx.config.braking_deceleration_walking;
                ctx.calc_velocity(time_tick, friction, false, braking);
            }
            ensure_finite(ctx.state.velocity, "walking velocity update")?;

            let move_velocity = ctx.state.velocity;
            let delta = move_velocity * time_tick;
            let zero_delta = is_nearly_zero(delta, KINDA_SMALL_NUMBER);
            let mut step_down = StepDownResult::default();

            if zero_delta {
                step.remaining_time = 0.0;
            } else {
                ctx.move_along_floor(move_velocity, time_tick, Some(&mut step_down));
                ctx.refresh_physics_volume();

                if ctx.is_falling() {
                    // Jumped or was pushed off mid-move.
                    let desired = delta.length();
                    if desired > KINDA_SMALL_NUMBER {
                        let actual = project_onto_plane(ctx.location() - old_location, ctx.up()).length();
                        step.remaining_time += time_tick * (1.0 - (actual / desired).min(1.0));
                    }
                    ctx.record_step(&step);
                    return ctx.start_new_physics(step.remaining_time, step.iterations);
                } else if ctx.state.mode == MovementMode::Swimming {
                    ctx.record_step(&step);
                    return ctx.start_swimming(old_location, old_velocity, time_tick, step.remaining_time, step.iterations);
                } else if !ctx.is_moving_on_ground() {
                    ctx.record_step(&step);
                    return ctx.start_new_physics(step.remaining_time, step.iterations);
                }
            }

            if step_down.computed_floor {
                ctx.state.floor.store(step_down.floor);
            } else {
                let location = ctx.location();
                let floor = ctx.find_floor(location, zero_delta, None);
                ctx.state.floor.store(floor);
            }

            let floor = *ctx.state.floor.current();
            if !ctx.config.can_walk_off_ledges && !floor.is_walkable_floor() {
                let new_delta = if tried_ledge_move {
                    Vec3::ZERO
                } else {
                    ctx.ledge_move(old_location, delta, -ctx.up())
                };

                if new_delta != Vec3::ZERO {
                    ctx.revert_move(old_location, old_base, previous_base_transform, old_floor, false);
                    tried_ledge_move = true;
                    ctx.state.velocity = new_delta / time_tick;
                    step.remaining_time += time_tick;
                    log::trace!("redirecting along the ledge by {new_delta}");
                    continue;
                }

                let must_jump = zero_delta || ctx.must_leave_base(old_base);
                if must_jump || !checked_fall {
                    ctx.record_step(&step);
                    if ctx.check_fall(&old_floor, delta, old_location, step.remaining_time, time_tick, step.iterations, must_jump)? {
                        return Ok(());
                    }
                }
                checked_fall = true;

                ctx.revert_move(old_location, old_base, previous_base_transform, old_floor, true);
                step.remaining_time = 0.0;
                break;
            }

            if floor.is_walkable_floor() {
                ctx.adjust_floor_height();
                ctx.set_base_from_floor();
                if !ctx.is_moving_on_ground() {
                    ctx.record_step(&step);
                    return ctx.start_new_physics(step.remaining_time, step.iterations);
                }
            } else if floor.hit.start_penetrating && step.remaining_time <= 0.0 {
                // Pop out of the floor rather than sweeping down into it.
                let mut hit = floor.hit;
                hit.trace_end = hit.trace_start + ctx.up() * ctx.config.max_floor_dist;
                let adjustment = ctx.penetration_adjustment(&hit);
                let rotation = ctx.rotation();
                ctx.resolve_penetration(adjustment, &hit, rotation);
            }

            if ctx.state.mode == MovementMode::Swimming {
                ctx.record_step(&step);
                let velocity = ctx.state.velocity;
                return ctx.start_swimming(old_location, velocity, time_tick, step.remaining_time, step.iterations);
            }

            let floor = *ctx.state.floor.current();
            if !floor.is_walkable_floor() && !floor.hit.start_penetrating {
                let must_jump = ctx.state.flags.just_teleported() || zero_delta || ctx.must_leave_base(old_base);
                if must_jump || !checked_fall {
                    ctx.record_step(&step);
                    if ctx.check_fall(&old_floor, delta, old_location, step.remaining_time, time_tick, step.iterations, must_jump)? {
                        return Ok(());
                    }
                }
                checked_fall = true;
            }

            if ctx.is_moving_on_ground()
                && !ctx.state.flags.just_teleported()
                && !ctx.state.has_root_motion()
                && time_tick >= MIN_TICK_TIME
            {
                ctx.state.velocity = (ctx.location() - old_location) / time_tick;
            }

            // Stuck: later iterations would not move either.
            if ctx.location() == old_location {
                step.remaining_time = 0.0;
                break;
            }
        }

        ctx.record_step(&step);
        if ctx.is_moving_on_ground() {
            ctx.maintain_horizontal_ground_velocity();
        }
        Ok(())
    }
}

impl MoveContext<'_> {
    /// Ground friction of the current floor. Slick floors have none.
    pub fn ground_friction(&self) -> f32 {
        if self.state.floor.current().hit.surface.flags.contains(SurfaceFlags::SLICK) {
            0.0
        } else {
            self.config.ground_friction
        }
    }

    /// Tilt a planar move so it follows the ramp described by `ramp_hit`.
    ///
    /// Floors found only by the line trace, vertical walls and flat floors
    /// leave the delta unchanged.
    pub fn compute_ground_movement_delta(&self, delta: Vec3, ramp_hit: &HitResult, hit_from_line_trace: bool) -> Vec3 {
        let up = self.up();
        let floor_normal = ramp_hit.impact_normal;
        let floor_up = floor_normal.dot(up);

        if floor_up < 1.0 - KINDA_SMALL_NUMBER
            && floor_up > KINDA_SMALL_NUMBER
            && ramp_hit.normal.dot(up) > KINDA_SMALL_NUMBER
            && !hit_from_line_trace
            && self.is_walkable(ramp_hit)
        {
            let ramp = delta - up * (floor_normal.dot(delta) / floor_up);
            if self.config.maintain_horizontal_ground_velocity {
                return ramp;
            }
            return safe_normal(ramp) * delta.length();
        }
        delta
    }

    /// Move along the current floor at `velocity` for `delta_time`.
    ///
    /// Blocking walkable ramps are followed, other obstacles are stepped
    /// onto when possible and slid along otherwise.
    pub fn move_along_floor(&mut self, velocity: Vec3, delta_time: f32, mut step_down: Option<&mut StepDownResult>) {
        let floor = *self.state.floor.current();
        if !floor.is_walkable_floor() {
            return;
        }

        let up = self.up();
        let delta = project_onto_plane(velocity, up) * delta_time;
        let ramp = self.compute_ground_movement_delta(delta, &floor.hit, floor.line_trace);
        let rotation = self.rotation();
        let mut hit = self.safe_move(ramp, rotation, true);

        if hit.start_penetrating {
            // Deflect off the penetrating hit instead of stalling for the rest of the update.
            self.handle_impact(&hit);
            let normal = hit.normal;
            self.slide_along_surface(delta, 1.0, normal, &mut hit, true);
            if hit.start_penetrating {
                log::debug!("stuck in geometry at {}", self.location());
            }
            return;
        }

        if !hit.is_valid_blocking_hit() {
            return;
        }

        let mut percent_applied = hit.time;
        if hit.time > 0.0 && hit.normal.dot(up) > KINDA_SMALL_NUMBER && self.is_walkable(&hit) {
            // Another walkable ramp.
            let remaining = 1.0 - percent_applied;
            let ramp = self.compute_ground_movement_delta(delta * remaining, &hit, false);
            hit = self.safe_move(ramp, rotation, true);
            percent_applied = (percent_applied + hit.time * remaining).clamp(0.0, 1.0);
        }

        if !hit.is_valid_blocking_hit() {
            return;
        }

        if hit.impact_normal.dot(up) > KINDA_SMALL_NUMBER && self.is_walkable(&hit) {
            // Grazing walkable ground is floor contact, not a step.
            let normal = hit.normal;
            self.slide_along_surface(delta, 1.0 - percent_applied, normal, &mut hit, false);
            return;
        }

        let on_own_base = self.state.base.base.is_some() && self.state.base.base == hit.body;
        if self.can_step_up(&hit) || on_own_base {
            let remaining = delta * (1.0 - percent_applied);
            if self.step_up(-up, remaining, &hit, step_down.as_deref_mut()) {
                if !self.config.maintain_horizontal_ground_velocity {
                    self.state.flags.set(MovementFlags::JUST_TELEPORTED, true);
                }
            } else {
                self.handle_impact(&hit);
                let normal = hit.normal;
                self.slide_along_surface(delta, 1.0 - percent_applied, normal, &mut hit, true);
            }
        } else if !hit.surface.can_step_up() {
            self.handle_impact(&hit);
            let normal = hit.normal;
            self.slide_along_surface(delta, 1.0 - percent_applied, normal, &mut hit, true);
        }
    }

    /// Sideways alternative to a move that walked off a ledge.
    ///
    /// Tries the move rotated a quarter turn about gravity, first left and
    /// then right. Returns zero when neither keeps the character on a floor.
    pub fn ledge_move(&self, old_location: Vec3, delta: Vec3, gravity_direction: Vec3) -> Vec3 {
        if !self.has_valid_data() || delta == Vec3::ZERO {
            return Vec3::ZERO;
        }

        let planar = project_onto_plane(delta, gravity_direction);
        let left = Quat::from_axis_angle(gravity_direction, std::f32::consts::FRAC_PI_2) * planar;
        if self.check_ledge_direction(old_location, left, gravity_direction) {
            return left;
        }
        let right = -left;
        if self.check_ledge_direction(old_location, right, gravity_direction) {
            return right;
        }
        Vec3::ZERO
    }

    /// Whether stepping sideways by `side_step` keeps a walkable floor under the capsule.
    fn check_ledge_direction(&self, old_location: Vec3, side_step: Vec3, gravity_direction: Vec3) -> bool {
        let destination = old_location + side_step;
        let rotation = self.rotation();
        let capsule = self.capsule();
        let filter = self.filter();

        let mut result = self
            .world
            .sweep_capsule(old_location, destination, rotation, capsule, filter);
        if result.blocking_hit && !self.is_walkable(&result) {
            return false;
        }
        if !result.blocking_hit {
            let probe = gravity_direction * (self.config.max_step_height + self.config.ledge_check_threshold);
            result = self
                .world
                .sweep_capsule(destination, destination + probe, rotation, capsule, filter);
        }
        result.blocking_hit && result.time < 1.0 && self.is_walkable(&result)
    }

    /// Start falling off a ledge when allowed. Returns whether the character
    /// now falls.
    #[allow(clippy::too_many_arguments)]
    pub fn check_fall(
        &mut self,
        old_floor: &FloorResult,
        delta: Vec3,
        old_location: Vec3,
        remaining_time: f32,
        time_tick: f32,
        iterations: u32,
        must_jump: bool,
    ) -> Result<bool, LocomotionError> {
        if !self.has_valid_data() {
            return Ok(false);
        }
        if !must_jump && !self.config.can_walk_off_ledges {
            return Ok(false);
        }

        log::debug!("walked off a ledge at {old_location}");
        self.observer
            .on_walking_off_ledge(old_floor.hit.impact_normal, old_location);
        if self.is_moving_on_ground() {
            self.start_falling(iterations, remaining_time, time_tick, delta, old_location)?;
        }
        Ok(true)
    }

    /// Undo a walking sub-step, restoring the old floor when the old base
    /// has not moved.
    pub fn revert_move(
        &mut self,
        old_location: Vec3,
        old_base: Option<BodyId>,
        previous_base_transform: Option<BaseTransform>,
        old_floor: FloorResult,
        fail_move: bool,
    ) {
        let rotation = self.rotation();
        self.state.body.set_transform(old_location, rotation);
        self.state.flags.set(MovementFlags::JUST_TELEPORTED, false);

        let base_unchanged = old_base.is_some_and(|base| {
            let current = self.world.base_transform(base);
            current.is_some() && (!self.world.is_dynamic_base(base) || current == previous_base_transform)
        });
        if base_unchanged {
            self.state.floor.store(old_floor);
            self.set_base(old_base);
        } else {
            self.set_base(None);
        }

        if fail_move {
            self.state.velocity = Vec3::ZERO;
            self.state.acceleration = Vec3::ZERO;
        }
    }

    /// The old base cannot hold the character up any more.
    fn must_leave_base(&self, old_base: Option<BodyId>) -> bool {
        match old_base {
            None => true,
            Some(base) => {
                !self.world.body_blocks(base, self.state.body.collision_mask) && self.world.is_dynamic_base(base)
            }
        }
    }
}
