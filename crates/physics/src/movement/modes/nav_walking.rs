//! Walking on navigation data.
//!
//! Nav-walking skips floor sweeps. The desired location is projected onto
//! the walkable surface below it with a single line trace against solid
//! geometry, and the capsule is placed there, optionally sweeping.

use glam::Vec3;

use super::MovementPhysics;
use crate::collision::{ContentFlags, QueryFilter};
use crate::error::{ensure_finite, LocomotionError};
use crate::math::{is_nearly_zero, project_onto_plane, KINDA_SMALL_NUMBER, MIN_TICK_TIME};
use crate::movement::context::{MoveContext, SimulationStep};
use crate::movement::state::{MovementFlags, MovementMode};

/// Ground movement projected onto the nav floor.
#[derive(Debug, Clone, Copy, Default)]
pub struct NavWalkingPhysics;

impl MovementPhysics for NavWalkingPhysics {
    fn simulate(&self, ctx: &mut MoveContext<'_>, delta_time: f32, iterations: u32) -> Result<(), LocomotionError> {
        if delta_time < MIN_TICK_TIME {
            return Ok(());
        }

        let up = ctx.up();
        if !ctx.state.has_root_motion() {
            ctx.state.velocity = project_onto_plane(ctx.state.velocity, up);
            let friction = ctx.config.ground_friction;
            let braking = ctx.max_braking_deceleration();
            ctx.calc_velocity(delta_time, friction, false, braking);
        }
        ensure_finite(ctx.state.velocity, "nav-walking")?;

        let iterations = iterations + 1;
        let old_location = ctx.location();
        let delta = project_onto_plane(ctx.state.velocity, up) * delta_time;
        let destination = old_location + delta;

        let Some(nav_floor) = ctx.find_nav_floor(destination) else {
            log::debug!("lost the nav floor at {destination}, walking instead");
            ctx.set_movement_mode(MovementMode::Walking);
            return ctx.start_new_physics(delta_time, iterations);
        };

        // Stand on the nav floor in the middle of the clearance band.
        let clearance = 0.5 * (ctx.config.min_floor_dist + ctx.config.max_floor_dist);
        let floor_height = (nav_floor - destination).dot(up);
        let target = destination + up * (floor_height + ctx.capsule().half_height + clearance);
        let adjusted = target - old_location;

        if !is_nearly_zero(adjusted, KINDA_SMALL_NUMBER) {
            let rotation = ctx.rotation();
            let sweep = ctx.config.sweep_while_nav_walking;
            let mut hit = ctx.safe_move(adjusted, rotation, sweep);
            if hit.blocking_hit && hit.time < 1.0 {
                ctx.handle_impact(&hit);
                let normal = hit.normal;
                ctx.slide_along_surface(adjusted, 1.0 - hit.time, normal, &mut hit, true);
            }
        }

        if !ctx.state.flags.just_teleported() && !ctx.state.has_root_motion() {
            ctx.state.velocity = (ctx.location() - old_location) / delta_time;
            ctx.maintain_horizontal_ground_velocity();
        }
        ctx.state.flags.set(MovementFlags::JUST_TELEPORTED, false);

        ctx.record_step(&SimulationStep::new(0.0, iterations));
        Ok(())
    }
}

impl MoveContext<'_> {
    /// Walkable point on solid geometry below the capsule bottom at
    /// `capsule_location`, within the max step height up or down.
    pub fn find_nav_floor(&self, capsule_location: Vec3) -> Option<Vec3> {
        let up = self.up();
        let feet = capsule_location - up * self.capsule().half_height;
        let max_step = self.config.max_step_height;
        let start = feet + up * max_step;
        let end = feet - up * (max_step + self.config.ledge_check_threshold);

        let hit = self
            .world
            .line_trace(start, end, QueryFilter::new(ContentFlags::SOLID));
        if !hit.is_valid_blocking_hit() || !self.is_walkable(&hit) {
            return None;
        }
        Some(hit.location)
    }
}
