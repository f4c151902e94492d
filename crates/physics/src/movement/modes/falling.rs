//! Falling under gravity with limited air control.

use glam::Vec3;

use super::MovementPhysics;
use crate::collision::HitResult;
use crate::error::{ensure_finite, LocomotionError};
use crate::math::{
    clamp_to_max_size, project_onto_plane, safe_normal, KINDA_SMALL_NUMBER, MIN_TICK_TIME, VERTICAL_SLOPE_NORMAL_Z,
};
use crate::movement::context::{MoveContext, SimulationStep};
use crate::movement::state::{MovementFlags, MovementMode};

/// Integrates gravity, air control and landing.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallingPhysics;

impl MovementPhysics for FallingPhysics {
    fn simulate(&self, ctx: &mut MoveContext<'_>, delta_time: f32, iterations: u32) -> Result<(), LocomotionError> {
        if delta_time < MIN_TICK_TIME {
            return Ok(());
        }

        let gravity_direction = ctx.gravity_direction(false);
        if gravity_direction == Vec3::ZERO {
            ctx.state.acceleration = Vec3::ZERO;
            ctx.state.velocity = Vec3::ZERO;
            return Ok(());
        }

        let fall_acceleration = ctx.falling_lateral_acceleration();
        let has_air_control = fall_acceleration.length_squared() > 0.0;
        let mut step = SimulationStep::new(delta_time, iterations);

        while step.has_time(ctx.config) {
            let time_tick = step.advance(ctx.config);
            ensure_finite(ctx.state.velocity, "falling")?;

            let old_location = ctx.location();
            let rotation = ctx.rotation();
            ctx.state.flags.set(MovementFlags::JUST_TELEPORTED, false);

            let old_velocity = ctx.state.velocity;
            let mut velocity_no_air_control = ctx.state.velocity;

            if !ctx.state.has_root_motion() {
                let old_velocity_z = gravity_direction * ctx.state.velocity.dot(gravity_direction);

                if has_air_control {
                    // Lateral velocity with no input at all.
                    let acceleration = ctx.state.acceleration;
                    let velocity = ctx.state.velocity;
                    ctx.state.acceleration = Vec3::ZERO;
                    ctx.state.velocity = project_onto_plane(velocity, gravity_direction);
                    ctx.calc_falling_velocity(time_tick);
                    velocity_no_air_control = project_onto_plane(ctx.state.velocity, gravity_direction) + old_velocity_z;
                    ctx.state.acceleration = acceleration;
                    ctx.state.velocity = velocity;
                }

                let acceleration = ctx.state.acceleration;
                ctx.state.acceleration = fall_acceleration;
                ctx.state.velocity = project_onto_plane(ctx.state.velocity, gravity_direction);
                ctx.calc_falling_velocity(time_tick);
                ctx.state.velocity = project_onto_plane(ctx.state.velocity, gravity_direction) + old_velocity_z;
                ctx.state.acceleration = acceleration;

                if !has_air_control {
                    velocity_no_air_control = ctx.state.velocity;
                }
            }

            let gravity = ctx.gravity_vector();
            ctx.state.velocity = ctx.new_fall_velocity(ctx.state.velocity, gravity, time_tick);
            velocity_no_air_control = ctx.new_fall_velocity(velocity_no_air_control, gravity, time_tick);
            let air_control_acceleration = (ctx.state.velocity - velocity_no_air_control) / time_tick;
            ensure_finite(ctx.state.velocity, "falling velocity update")?;

            if ctx.state.flags.has(MovementFlags::NOTIFY_APEX) && -ctx.state.velocity.dot(gravity_direction) <= 0.0 {
                ctx.notify_jump_apex();
            }

            let mut adjusted = (old_velocity + ctx.state.velocity) * 0.5 * time_tick;
            let mut hit = ctx.safe_move(adjusted, rotation, true);
            if !ctx.has_valid_data() {
                return Ok(());
            }
            ctx.refresh_physics_volume();

            let mut last_move_time_slice = time_tick;
            let mut sub_time_tick_remaining = time_tick * (1.0 - hit.time);

            if ctx.state.mode == MovementMode::Swimming {
                step.remaining_time += sub_time_tick_remaining;
                ctx.record_step(&step);
                return ctx.start_swimming(old_location, old_velocity, time_tick, step.remaining_time, step.iterations);
            }
            if !ctx.is_falling() {
                ctx.record_step(&step);
                return ctx.start_new_physics(step.remaining_time + sub_time_tick_remaining, step.iterations);
            }

            if hit.blocking_hit {
                let location = ctx.location();
                if ctx.is_valid_landing_spot(location, &hit) {
                    step.remaining_time += sub_time_tick_remaining;
                    ctx.record_step(&step);
                    return ctx.process_landed(&hit, step.remaining_time, step.iterations);
                }

                // Deflect using the final velocity so the full gravity effect is kept.
                adjusted = ctx.state.velocity * time_tick;

                // An edge under the lower hemisphere may still have a floor on top.
                if !hit.start_penetrating && ctx.should_check_for_valid_landing_spot(&hit) {
                    let floor = ctx.find_floor(location, false, None);
                    if floor.is_walkable_floor() && ctx.is_valid_landing_spot(location, &floor.hit) {
                        step.remaining_time += sub_time_tick_remaining;
                        ctx.record_step(&step);
                        return ctx.process_landed(&floor.hit, step.remaining_time, step.iterations);
                    }
                }

                ctx.handle_impact(&hit);
                if !ctx.has_valid_data() || !ctx.is_falling() {
                    ctx.record_step(&step);
                    return Ok(());
                }

                if has_air_control {
                    let air_control_delta_v =
                        ctx.limit_air_control(air_control_acceleration, &hit, false) * last_move_time_slice;
                    adjusted = (velocity_no_air_control + air_control_delta_v) * last_move_time_slice;
                }

                let old_hit_normal = hit.normal;
                let old_hit_impact_normal = hit.impact_normal;
                let mut delta = ctx.compute_slide_vector(adjusted, 1.0 - hit.time, old_hit_normal, &hit);

                if sub_time_tick_remaining > KINDA_SMALL_NUMBER && !ctx.state.flags.just_teleported() {
                    ctx.set_deflected_velocity(delta / sub_time_tick_remaining, gravity_direction);
                }

                if sub_time_tick_remaining > KINDA_SMALL_NUMBER && delta.dot(adjusted) > 0.0 {
                    hit = ctx.safe_move(delta, rotation, true);

                    if hit.blocking_hit {
                        // Second wall.
                        last_move_time_slice = sub_time_tick_remaining;
                        sub_time_tick_remaining *= 1.0 - hit.time;

                        let location = ctx.location();
                        if ctx.is_valid_landing_spot(location, &hit) {
                            step.remaining_time += sub_time_tick_remaining;
                            ctx.record_step(&step);
                            return ctx.process_landed(&hit, step.remaining_time, step.iterations);
                        }

                        ctx.handle_impact(&hit);
                        if !ctx.has_valid_data() || !ctx.is_falling() {
                            ctx.record_step(&step);
                            return Ok(());
                        }

                        if has_air_control && hit.normal.dot(gravity_direction) < -VERTICAL_SLOPE_NORMAL_Z {
                            delta = ctx.compute_slide_vector(
                                velocity_no_air_control * last_move_time_slice,
                                1.0,
                                old_hit_normal,
                                &hit,
                            );
                        }

                        delta = ctx.two_wall_adjust(delta, &hit, old_hit_normal);

                        if has_air_control {
                            let air_control_delta_v =
                                ctx.limit_air_control(air_control_acceleration, &hit, false) * sub_time_tick_remaining;
                            // Only if it does not push back into the first wall.
                            if air_control_delta_v.dot(old_hit_normal) > 0.0 {
                                delta += air_control_delta_v * sub_time_tick_remaining;
                            }
                        }

                        if sub_time_tick_remaining > KINDA_SMALL_NUMBER && !ctx.state.flags.just_teleported() {
                            ctx.set_deflected_velocity(delta / sub_time_tick_remaining, gravity_direction);
                        }

                        // Wedged between two slopes neither of which can be stood on.
                        let ditch = old_hit_impact_normal.dot(gravity_direction) < 0.0
                            && hit.impact_normal.dot(gravity_direction) < 0.0
                            && delta.dot(gravity_direction).abs() <= KINDA_SMALL_NUMBER
                            && hit.impact_normal.dot(old_hit_impact_normal) < 0.0;

                        hit = ctx.safe_move(delta, rotation, true);

                        if hit.time == 0.0 {
                            // Stuck: try a side step.
                            let mut side_delta =
                                safe_normal(project_onto_plane(old_hit_normal + hit.impact_normal, gravity_direction));
                            if side_delta.abs().max_element() <= KINDA_SMALL_NUMBER {
                                side_delta = gravity_direction
                                    .cross(safe_normal(project_onto_plane(old_hit_normal, gravity_direction)));
                            }
                            hit = ctx.safe_move(side_delta, rotation, true);
                        }

                        let location = ctx.location();
                        if ditch || hit.time == 0.0 || ctx.is_valid_landing_spot(location, &hit) {
                            step.remaining_time = 0.0;
                            ctx.record_step(&step);
                            return ctx.process_landed(&hit, step.remaining_time, step.iterations);
                        } else if ctx.config.perch_radius_threshold > 0.0
                            && hit.time == 1.0
                            && old_hit_impact_normal.dot(gravity_direction) <= -ctx.config.walkable_floor_z
                        {
                            ctx.nudge_out_of_perch_ditch(old_location, time_tick, gravity_direction);
                        }
                    }
                }
            }

            if project_onto_plane(ctx.state.velocity, gravity_direction).length_squared() <= KINDA_SMALL_NUMBER * 10.0 {
                ctx.state.velocity = gravity_direction * ctx.state.velocity.dot(gravity_direction);
            }
        }

        ctx.record_step(&step);
        Ok(())
    }
}

impl MoveContext<'_> {
    /// Velocity after `delta_time` of `gravity`, capped at terminal velocity
    /// along the gravity direction.
    pub fn new_fall_velocity(&self, velocity: Vec3, gravity: Vec3, delta_time: f32) -> Vec3 {
        if gravity == Vec3::ZERO {
            return velocity;
        }
        let mut result = velocity + gravity * delta_time;
        let direction = safe_normal(gravity);
        let terminal = self.config.terminal_velocity.abs();
        if result.dot(direction) > terminal {
            result = project_onto_plane(result, direction) + direction * terminal;
        }
        result
    }

    /// Input acceleration available while falling.
    ///
    /// Only the part perpendicular to gravity counts, scaled by air control.
    /// Nearly stationary characters get a temporary boost.
    pub fn falling_lateral_acceleration(&self) -> Vec3 {
        let gravity_direction = self.gravity_direction(false);
        let mut acceleration = project_onto_plane(self.state.acceleration, gravity_direction);

        if !self.state.has_root_motion() && acceleration.length_squared() > 0.0 {
            let mut air_control = self.config.air_control;
            let threshold = self.config.air_control_boost_velocity_threshold;
            if air_control != 0.0
                && self.config.air_control_boost_multiplier > 0.0
                && project_onto_plane(self.state.velocity, gravity_direction).length_squared() < threshold * threshold
            {
                air_control = (self.config.air_control_boost_multiplier * air_control).min(1.0);
            }
            acceleration = clamp_to_max_size(acceleration * air_control, self.config.max_acceleration);
        }
        acceleration
    }

    /// Air control acceleration allowed against `hit`.
    ///
    /// Acceleration into a wall is flattened along it, and a penetrating hit
    /// only allows acceleration that leads out of it.
    pub fn limit_air_control(&mut self, fall_acceleration: Vec3, hit: &HitResult, check_for_valid_landing_spot: bool) -> Vec3 {
        let up = -self.gravity_direction(true);
        if hit.is_valid_blocking_hit() && hit.normal.dot(up) > VERTICAL_SLOPE_NORMAL_Z {
            let landing = check_for_valid_landing_spot && self.is_valid_landing_spot(hit.location, hit);
            if !landing && fall_acceleration.dot(hit.normal) < 0.0 {
                let wall_normal = safe_normal(project_onto_plane(hit.normal, up));
                return project_onto_plane(fall_acceleration, wall_normal);
            }
        } else if hit.start_penetrating {
            return if fall_acceleration.dot(hit.normal) > 0.0 {
                fall_acceleration
            } else {
                Vec3::ZERO
            };
        }
        fall_acceleration
    }

    /// Whether the capsule at `capsule_location` can land on `hit`.
    ///
    /// The impact must be walkable, below the lower hemisphere and inside
    /// the edge tolerance, and a floor query from there must find a walkable
    /// floor.
    pub fn is_valid_landing_spot(&mut self, capsule_location: Vec3, hit: &HitResult) -> bool {
        if !hit.blocking_hit {
            return false;
        }
        let down = -self.up();

        if !hit.start_penetrating {
            if !self.is_walkable(hit) {
                return false;
            }

            let capsule = self.capsule();
            let bottom = hit.location + down * capsule.segment_half_height();
            let top = hit.location - down;
            let segment = top - bottom;
            let alpha = (hit.impact_point - bottom).dot(segment) / segment.length_squared();
            // Above the lower hemisphere: sliding down a vertical surface.
            if alpha >= 0.0 {
                return false;
            }
            if !self.is_within_edge_tolerance(hit.location, hit.impact_point, capsule.radius) {
                return false;
            }
        } else if hit.normal.dot(down) > -KINDA_SMALL_NUMBER {
            // Push-out next to a wall or overhang, not a floor.
            return false;
        }

        let floor = self.find_floor(capsule_location, false, Some(hit));
        floor.is_walkable_floor()
    }

    /// An edge hit on the lower hemisphere, which may have a floor on top.
    pub fn should_check_for_valid_landing_spot(&self, hit: &HitResult) -> bool {
        hit.normal.dot(self.up()) > KINDA_SMALL_NUMBER
            && !hit.normal.abs_diff_eq(hit.impact_normal, KINDA_SMALL_NUMBER)
            && self.is_within_edge_tolerance(self.location(), hit.impact_point, self.capsule().radius)
    }

    /// Land on `hit` and continue in the landed mode with the time left.
    pub fn process_landed(&mut self, hit: &HitResult, remaining_time: f32, iterations: u32) -> Result<(), LocomotionError> {
        log::debug!("landed at {} on {:?}", hit.location, hit.body);
        self.notify_landed(hit);
        if self.is_falling() {
            self.refresh_physics_volume();
            if self.state.flags.in_water() && self.config.can_ever_swim {
                self.set_movement_mode(MovementMode::Swimming);
            } else {
                self.set_movement_mode(MovementMode::Walking);
            }
        }
        self.start_new_physics(remaining_time, iterations)
    }

    /// Leave the ground and fall for the rest of the sub-step.
    ///
    /// Time not spent moving during the sub-step is handed to falling, and
    /// speed along gravity picked up from following the ground is dropped.
    pub fn start_falling(
        &mut self,
        iterations: u32,
        remaining_time: f32,
        time_tick: f32,
        delta: Vec3,
        sub_location: Vec3,
    ) -> Result<(), LocomotionError> {
        let desired = delta.length();
        let remaining_time = if desired < KINDA_SMALL_NUMBER {
            0.0
        } else {
            let actual = (self.location() - sub_location).length();
            remaining_time + time_tick * (1.0 - (actual / desired).min(1.0))
        };

        let gravity_direction = self.gravity_direction(false);
        if gravity_direction != Vec3::ZERO {
            self.state.velocity = project_onto_plane(self.state.velocity, gravity_direction);
        }

        if self.is_moving_on_ground() {
            self.set_movement_mode(MovementMode::Falling);
        }
        self.start_new_physics(remaining_time, iterations)
    }

    fn calc_falling_velocity(&mut self, time_tick: f32) {
        let friction = self.config.falling_lateral_friction;
        let braking = self.config.braking_deceleration_falling;
        self.calc_velocity(time_tick, friction, false, braking);
    }

    /// Velocity after a deflection. Root motion keeps its own lateral velocity.
    fn set_deflected_velocity(&mut self, new_velocity: Vec3, gravity_direction: Vec3) {
        if self.state.has_root_motion() {
            self.state.velocity = project_onto_plane(self.state.velocity, gravity_direction)
                + gravity_direction * new_velocity.dot(gravity_direction);
        } else {
            self.state.velocity = new_velocity;
        }
    }

    /// Shake the character out of a spot between two perch edges where it
    /// hardly moves.
    fn nudge_out_of_perch_ditch(&mut self, old_location: Vec3, time_tick: f32, gravity_direction: Vec3) {
        let moved = self.location() - old_location;
        let along_gravity = moved.dot(gravity_direction).abs();
        let planar_sq = project_onto_plane(moved, gravity_direction).length_squared();
        if along_gravity > 0.2 * time_tick || planar_sq > 4.0 * time_tick {
            return;
        }

        let spread = 0.25 * self.max_speed();
        let jitter = Vec3::new(
            self.state.rng.next_range(-0.5, 0.5),
            self.state.rng.next_range(-0.5, 0.5),
            self.state.rng.next_range(-0.5, 0.5),
        );
        let velocity = self.state.velocity + jitter * spread;
        let fall_speed = (self.config.jump_z_velocity * 0.25).max(1.0);
        self.state.velocity = project_onto_plane(velocity, gravity_direction) + gravity_direction * fall_speed;
        log::trace!("nudging out of a perch ditch at {}", self.location());

        let delta = self.state.velocity * time_tick;
        let rotation = self.rotation();
        self.safe_move(delta, rotation, true);
    }
}
