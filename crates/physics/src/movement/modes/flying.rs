//! Free flight, ignoring gravity.

use super::MovementPhysics;
use crate::error::{ensure_finite, LocomotionError};
use crate::math::{safe_normal, MIN_TICK_TIME};
use crate::movement::context::{MoveContext, SimulationStep};
use crate::movement::state::MovementFlags;

/// One swept move per call, stepping over low obstacles when the flight
/// is mostly level.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlyingPhysics;

impl MovementPhysics for FlyingPhysics {
    fn simulate(&self, ctx: &mut MoveContext<'_>, delta_time: f32, iterations: u32) -> Result<(), LocomotionError> {
        if delta_time < MIN_TICK_TIME {
            return Ok(());
        }

        // The axis is still needed to tell level flight from climbing.
        let gravity_direction = ctx.gravity_direction(true);

        if !ctx.state.has_root_motion() {
            let friction = 0.5 * ctx.config.fluid_friction;
            let braking = ctx.config.braking_deceleration_flying;
            ctx.calc_velocity(delta_time, friction, true, braking);
        }
        ensure_finite(ctx.state.velocity, "flying")?;

        let iterations = iterations + 1;
        let mut old_location = ctx.location();
        ctx.state.flags.set(MovementFlags::JUST_TELEPORTED, false);

        let adjusted = ctx.state.velocity * delta_time;
        let rotation = ctx.rotation();
        let mut hit = ctx.safe_move(adjusted, rotation, true);

        if hit.blocking_hit && hit.time < 1.0 {
            let up_down = gravity_direction.dot(safe_normal(ctx.state.velocity));
            let mut stepped_up = false;

            if up_down < 0.5
                && up_down > -0.2
                && hit.impact_normal.dot(gravity_direction).abs() < 0.2
                && ctx.can_step_up(&hit)
            {
                let step_start = ctx.location();
                stepped_up = ctx.step_up(gravity_direction, adjusted * (1.0 - hit.time), &hit, None);
                if stepped_up {
                    old_location += gravity_direction * (ctx.location() - step_start).dot(gravity_direction);
                }
            }

            if !stepped_up {
                ctx.handle_impact(&hit);
                let normal = hit.normal;
                ctx.slide_along_surface(adjusted, 1.0 - hit.time, normal, &mut hit, true);
            }
        }

        if !ctx.state.flags.just_teleported() && !ctx.state.has_root_motion() {
            ctx.state.velocity = (ctx.location() - old_location) / delta_time;
        }

        ctx.refresh_physics_volume();
        ctx.record_step(&SimulationStep::new(0.0, iterations));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use crate::collision::{CollisionWorld, ContentFlags};
    use crate::movement::context::TestRig;
    use crate::movement::state::MovementMode;

    fn flying_rig(world: CollisionWorld, location: Vec3) -> TestRig {
        let mut rig = TestRig::new(world, location);
        rig.ctx().set_movement_mode(MovementMode::Flying);
        rig
    }

    #[test]
    fn test_flight_ignores_gravity() {
        let mut rig = flying_rig(CollisionWorld::new(), Vec3::new(0.0, 0.0, 500.0));
        rig.state.velocity = Vec3::Z * 300.0;

        for _ in 0..10 {
            rig.ctx().start_new_physics(0.05, 0).unwrap();
        }

        assert_eq!(rig.state.mode, MovementMode::Flying);
        assert!(rig.state.body.location().z > 600.0);
        assert!(rig.state.velocity.z > 0.0);
    }

    #[test]
    fn test_flight_speed_is_capped() {
        let mut rig = flying_rig(CollisionWorld::new(), Vec3::ZERO);
        rig.state.acceleration = Vec3::new(1.0, 0.0, 1.0).normalize() * rig.config.max_acceleration;

        for _ in 0..60 {
            rig.ctx().start_new_physics(1.0 / 30.0, 0).unwrap();
        }

        let speed = rig.state.velocity.length();
        assert!(speed <= rig.config.max_fly_speed + 1.0, "Flew at {speed}");
        assert!(speed > rig.config.max_fly_speed * 0.5);
    }

    #[test]
    fn test_slides_along_wall() {
        let mut world = CollisionWorld::new();
        world.add_box(Vec3::new(150.0, 0.0, 0.0), Vec3::new(50.0, 1000.0, 1000.0), ContentFlags::SOLID);
        let mut rig = flying_rig(world, Vec3::new(0.0, 0.0, 0.0));
        rig.state.velocity = Vec3::new(400.0, 400.0, 0.0);
        rig.state.acceleration = Vec3::new(1.0, 1.0, 0.0).normalize() * rig.config.max_acceleration;

        for _ in 0..10 {
            rig.ctx().start_new_physics(0.05, 0).unwrap();
        }

        let location = rig.state.body.location();
        assert!(location.x < 100.0 - 34.0 + 0.5, "Went through the wall to {location}");
        assert!(location.y > 100.0, "Should slide along the wall, at {location}");
        assert!(rig.events.events.iter().any(|e| matches!(e, crate::movement::observer::MovementEvent::MoveBlocked { .. })));
    }

    #[test]
    fn test_level_flight_steps_over_low_obstacle() {
        let mut world = CollisionWorld::new();
        world.add_box(Vec3::new(0.0, 0.0, -50.0), Vec3::new(5000.0, 5000.0, 50.0), ContentFlags::SOLID);
        world.add_box(Vec3::new(350.0, 0.0, 15.0), Vec3::new(250.0, 500.0, 15.0), ContentFlags::SOLID);
        let mut rig = flying_rig(world, Vec3::new(60.0, 0.0, 90.15));
        rig.state.velocity = Vec3::X * 600.0;
        rig.state.acceleration = Vec3::X * rig.config.max_acceleration;

        rig.ctx().start_new_physics(0.1, 0).unwrap();

        let location = rig.state.body.location();
        assert!(location.z > 88.0 + 29.0, "Should be on top of the obstacle, at {location}");
        assert!(location.x > 100.0);
        assert!(rig.state.velocity.z.abs() < 1.0, "Climbing is not flight speed: {}", rig.state.velocity);
    }
}
