//! Swimming in water volumes.
//!
//! Buoyancy scales with how deep the capsule is immersed. Near the surface
//! upward input is limited, so a swimmer bobs at the water line instead of
//! leaving it, unless something blocks it and it climbs out.

use glam::Vec3;

use super::MovementPhysics;
use crate::collision::{ContentFlags, HitResult, QueryFilter};
use crate::error::{ensure_finite, LocomotionError};
use crate::math::{clamp_to_max_size, project_onto_plane, safe_normal, KINDA_SMALL_NUMBER, MIN_TICK_TIME};
use crate::movement::context::{MoveContext, SimulationStep};
use crate::movement::state::{MovementFlags, MovementMode};

/// Sinking speed a swimmer settles to after entering water (cm/s, along up).
const SWIM_BOB_SPEED: f32 = -80.0;

/// Offset from the water surface when placing a capsule on the water line.
const WATER_LINE_OFFSET: f32 = 0.1;

/// Immersion below which upward input is limited.
const SURFACE_DEPTH: f32 = 0.65;

/// Fraction of max swim speed a buoyant swimmer may rise at.
const RISE_SPEED_FACTOR: f32 = 0.33;

/// One move per call with buoyancy and fluid drag.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwimmingPhysics;

impl MovementPhysics for SwimmingPhysics {
    fn simulate(&self, ctx: &mut MoveContext<'_>, delta_time: f32, iterations: u32) -> Result<(), LocomotionError> {
        if delta_time < MIN_TICK_TIME {
            return Ok(());
        }

        let gravity_direction = ctx.gravity_direction(true);
        let up = -gravity_direction;
        let depth = ctx.immersion_depth();
        let net_buoyancy = ctx.config.buoyancy * depth;
        let max_swim_speed = ctx.max_speed();
        let input_acceleration = ctx.state.acceleration;
        let original_accel_up = input_acceleration.dot(up);
        let mut limited_up_accel = false;

        let up_speed = ctx.state.velocity.dot(up);
        if !ctx.state.has_root_motion() && up_speed > RISE_SPEED_FACTOR * max_swim_speed && net_buoyancy != 0.0 {
            let damped = (RISE_SPEED_FACTOR * max_swim_speed).max(up_speed * depth * depth);
            ctx.state.velocity += up * (damped - up_speed);
        } else if depth < SURFACE_DEPTH {
            limited_up_accel = original_accel_up > 0.0;
            ctx.state.acceleration += up * (original_accel_up.min(0.1) - original_accel_up);
        }

        let iterations = iterations + 1;
        let mut old_location = ctx.location();
        ctx.state.flags.set(MovementFlags::JUST_TELEPORTED, false);

        if !ctx.state.has_root_motion() {
            let friction = 0.5 * ctx.config.fluid_friction * depth;
            let braking = ctx.max_braking_deceleration();
            ctx.calc_velocity(delta_time, friction, true, braking);
            ctx.state.velocity += ctx.gravity_vector() * delta_time * (1.0 - net_buoyancy);
        }
        ctx.state.acceleration = input_acceleration;
        ensure_finite(ctx.state.velocity, "swimming")?;

        let mut adjusted = ctx.state.velocity * delta_time;
        let (air_time, mut hit) = ctx.swim(adjusted);
        let remaining_time = delta_time * air_time;
        let step = SimulationStep::new(remaining_time, iterations);

        if ctx.state.mode != MovementMode::Swimming {
            ctx.record_step(&step);
            return ctx.start_new_physics(remaining_time, iterations);
        }

        if hit.blocking_hit && hit.time < 1.0 {
            if limited_up_accel && ctx.state.velocity.dot(up) >= 0.0 {
                // Blocked at the surface: allow climbing out.
                ctx.state.velocity += up * (original_accel_up * delta_time);
                adjusted = ctx.state.velocity * (1.0 - hit.time) * delta_time;
                hit = ctx.swim(adjusted).1;
                if ctx.state.mode != MovementMode::Swimming {
                    ctx.record_step(&step);
                    return ctx.start_new_physics(remaining_time, iterations);
                }
            }

            let up_down = gravity_direction.dot(safe_normal(ctx.state.velocity));
            let mut stepped_up = false;
            if hit.impact_normal.dot(up).abs() < 0.2 && up_down < 0.5 && up_down > -0.2 && ctx.can_step_up(&hit) {
                let step_start = ctx.location();
                let real_velocity = ctx.state.velocity;
                // Rising, in case the step leaves the water.
                ctx.state.velocity = project_onto_plane(real_velocity, up) + up;
                stepped_up = ctx.step_up(gravity_direction, adjusted * (1.0 - hit.time), &hit, None);
                if stepped_up {
                    ctx.refresh_physics_volume();
                    if ctx.state.mode != MovementMode::Swimming {
                        ctx.record_step(&step);
                        return ctx.start_new_physics(remaining_time, iterations);
                    }
                    old_location += up * (ctx.location() - step_start).dot(up);
                }
                ctx.state.velocity = real_velocity;
            }

            if !stepped_up {
                ctx.handle_impact(&hit);
                let normal = hit.normal;
                ctx.slide_along_surface(adjusted, 1.0 - hit.time, normal, &mut hit, true);
            }
        }

        let moved_time = delta_time - remaining_time;
        if !ctx.state.has_root_motion() && !ctx.state.flags.just_teleported() && moved_time > KINDA_SMALL_NUMBER {
            let up_speed = ctx.state.velocity.dot(up);
            let velocity = (ctx.location() - old_location) / moved_time;
            ctx.state.velocity = if ctx.state.flags.in_water() {
                velocity
            } else {
                // Jumping out of the water keeps its rising speed.
                project_onto_plane(velocity, up) + up * up_speed
            };
        }

        if !ctx.state.flags.in_water() && ctx.state.mode == MovementMode::Swimming {
            ctx.set_movement_mode(MovementMode::Falling);
        }

        ctx.record_step(&step);
        if ctx.state.mode != MovementMode::Swimming {
            return ctx.start_new_physics(remaining_time, iterations);
        }
        Ok(())
    }
}

impl MoveContext<'_> {
    /// Move by `delta` through water.
    ///
    /// When the move leaves the water, the capsule is pulled back to the
    /// water line and the returned fraction is the part of the move that
    /// would have been spent in the air.
    pub fn swim(&mut self, delta: Vec3) -> (f32, HitResult) {
        let start = self.location();
        let rotation = self.rotation();
        let mut hit = self.safe_move(delta, rotation, true);
        self.refresh_physics_volume();

        let mut air_time = 0.0;
        if !self.state.flags.in_water() {
            let location = self.location();
            let end = self.find_water_line(start, location);
            let desired = delta.length();
            if end != location && desired > KINDA_SMALL_NUMBER {
                air_time = (end - location).length() / desired;
                if (location - start).dot(end - location) > 0.0 {
                    air_time = 0.0;
                }
                hit = self.safe_move(end - location, rotation, true);
            }
        }
        (air_time, hit)
    }

    /// Point on the water surface between `in_water` and `out_of_water`,
    /// nudged to the side of the surface the capsule is currently on.
    pub fn find_water_line(&self, in_water: Vec3, out_of_water: Vec3) -> Vec3 {
        let hit = self
            .world
            .line_trace(out_of_water, in_water, QueryFilter::new(ContentFlags::WATER));
        if !hit.blocking_hit || hit.start_penetrating {
            return out_of_water;
        }
        let direction = safe_normal(in_water - out_of_water);
        if self.state.flags.in_water() {
            hit.location + direction * WATER_LINE_OFFSET
        } else {
            hit.location - direction * WATER_LINE_OFFSET
        }
    }

    /// Continue a sub-step that ended in water as swimming.
    ///
    /// The capsule is moved back to where it crossed the water line and the
    /// time it spent past that point is given back to the swim.
    pub fn start_swimming(
        &mut self,
        old_location: Vec3,
        old_velocity: Vec3,
        time_tick: f32,
        remaining_time: f32,
        iterations: u32,
    ) -> Result<(), LocomotionError> {
        if remaining_time < MIN_TICK_TIME || time_tick < MIN_TICK_TIME {
            return Ok(());
        }

        if !self.state.has_root_motion() {
            // The average velocity of the sub-step; the end velocity has
            // twice its acceleration.
            let average = (self.location() - old_location) / time_tick;
            self.state.velocity = clamp_to_max_size(2.0 * average - old_velocity, self.config.terminal_velocity);
        }

        let location = self.location();
        let end = self.find_water_line(location, old_location);
        let mut remaining_time = remaining_time;
        if end != location {
            let actual = (location - old_location).length();
            if actual > KINDA_SMALL_NUMBER {
                remaining_time += time_tick * (end - location).length() / actual;
            }
            let rotation = self.rotation();
            self.move_component(end - location, rotation, true);
        }

        let up = -self.gravity_direction(true);
        let up_speed = self.state.velocity.dot(up);
        if !self.state.has_root_motion() && up_speed > 2.0 * SWIM_BOB_SPEED && up_speed < 0.0 {
            let bob = SWIM_BOB_SPEED - self.state.velocity.length() * 0.001;
            self.state.velocity += up * (bob - up_speed);
        }

        log::debug!("started swimming at {} with {:.4}s left", self.location(), remaining_time);
        if remaining_time >= MIN_TICK_TIME && iterations < self.config.max_simulation_iterations {
            return self.start_new_physics(remaining_time, iterations);
        }
        Ok(())
    }
}
