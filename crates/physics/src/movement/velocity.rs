//! Velocity integration: acceleration, friction and braking.

use glam::Vec3;

use super::context::MoveContext;
use super::state::MovementFlags;
use crate::math::{clamp_to_max_size, safe_normal, KINDA_SMALL_NUMBER, MIN_TICK_TIME};

/// Braking never leaves a speed below this (cm/s).
const BRAKE_TO_STOP_VELOCITY: f32 = 10.0;

/// Bounds on the braking sub-step.
const MIN_BRAKING_SUB_STEP: f32 = 1.0 / 75.0;
const MAX_BRAKING_SUB_STEP: f32 = 1.0 / 20.0;

/// Fraction over the requested speed that still counts as "not there yet".
const REQUESTED_SPEED_BUFFER: f32 = 1.01;

/// Updates a character's velocity for one sub-step.
pub trait VelocitySolver {
    /// Integrate input and requested acceleration into the velocity.
    ///
    /// `fluid` applies drag proportional to `friction`.
    fn calc_velocity(
        &self,
        ctx: &mut MoveContext<'_>,
        delta_time: f32,
        friction: f32,
        fluid: bool,
        braking_deceleration: f32,
    );
}

/// Whether `velocity` is more than 1% over `max_speed`.
pub fn is_exceeding_max_speed(velocity: Vec3, max_speed: f32) -> bool {
    let max_speed = max_speed.max(0.0);
    velocity.length_squared() > max_speed * max_speed * REQUESTED_SPEED_BUFFER
}

/// Acceleration steers the current speed toward the input direction;
/// without input the velocity brakes toward zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrakingVelocitySolver;

impl BrakingVelocitySolver {
    /// Slow down by friction and constant deceleration, sub-stepped so the
    /// result barely depends on frame rate. Never reverses the direction.
    pub fn apply_velocity_braking(
        &self,
        ctx: &mut MoveContext<'_>,
        delta_time: f32,
        friction: f32,
        braking_deceleration: f32,
    ) {
        let velocity = ctx.state.velocity;
        if velocity == Vec3::ZERO || delta_time < MIN_TICK_TIME {
            return;
        }

        let friction = (friction * ctx.config.braking_friction_factor.max(0.0)).max(0.0);
        let braking_deceleration = braking_deceleration.max(0.0);
        let zero_friction = friction == 0.0;
        let zero_braking = braking_deceleration == 0.0;
        if zero_friction && zero_braking {
            return;
        }

        let old_velocity = velocity;
        let mut velocity = velocity;
        let max_step = ctx
            .config
            .braking_sub_step_time
            .clamp(MIN_BRAKING_SUB_STEP, MAX_BRAKING_SUB_STEP);
        let reverse_accel = if zero_braking {
            Vec3::ZERO
        } else {
            safe_normal(velocity) * -braking_deceleration
        };

        let mut remaining = delta_time;
        while remaining >= MIN_TICK_TIME {
            // Constant deceleration needs no sub-stepping.
            let dt = if remaining > max_step && !zero_friction {
                max_step.min(remaining * 0.5)
            } else {
                remaining
            };
            remaining -= dt;

            velocity += (velocity * -friction + reverse_accel) * dt;
            if velocity.dot(old_velocity) <= 0.0 {
                ctx.state.velocity = Vec3::ZERO;
                return;
            }
        }

        let speed_sq = velocity.length_squared();
        if speed_sq <= KINDA_SMALL_NUMBER
            || (!zero_braking && speed_sq <= BRAKE_TO_STOP_VELOCITY * BRAKE_TO_STOP_VELOCITY)
        {
            velocity = Vec3::ZERO;
        }
        ctx.state.velocity = velocity;
    }

    /// Steer toward the requested velocity.
    ///
    /// Returns the acceleration still needed and the speed being requested,
    /// or `None` when no request is active.
    pub fn apply_requested_move(
        &self,
        ctx: &mut MoveContext<'_>,
        delta_time: f32,
        max_accel: f32,
        max_speed: f32,
        friction: f32,
    ) -> Option<(Vec3, f32)> {
        if !ctx.state.has_requested_velocity() {
            return None;
        }
        let requested = ctx.state.requested_velocity;
        let requested_speed_sq = requested.length_squared();
        if requested_speed_sq < KINDA_SMALL_NUMBER {
            return None;
        }

        let mut requested_speed = requested_speed_sq.sqrt();
        let move_dir = requested / requested_speed;
        requested_speed = if ctx.state.flags.has(MovementFlags::REQUESTED_MOVE_WITH_MAX_SPEED) {
            max_speed
        } else {
            max_speed.min(requested_speed)
        };
        let move_velocity = move_dir * requested_speed;

        let mut acceleration = Vec3::ZERO;
        let velocity = ctx.state.velocity;
        let current_speed_sq = velocity.length_squared();
        let buffered = requested_speed * REQUESTED_SPEED_BUFFER;
        if ctx.config.requested_move_use_acceleration && current_speed_sq < buffered * buffered {
            let speed = current_speed_sq.sqrt();
            let turned = velocity - (velocity - move_dir * speed) * (delta_time * friction).min(1.0);
            ctx.state.velocity = turned;
            acceleration = clamp_to_max_size((move_velocity - turned) / delta_time, max_accel);
        } else {
            // Decelerate instantly so the character does not overshoot.
            ctx.state.velocity = move_velocity;
        }

        Some((acceleration, requested_speed))
    }
}

impl VelocitySolver for BrakingVelocitySolver {
    fn calc_velocity(
        &self,
        ctx: &mut MoveContext<'_>,
        delta_time: f32,
        friction: f32,
        fluid: bool,
        braking_deceleration: f32,
    ) {
        if !ctx.has_valid_data() || ctx.state.has_root_motion() || delta_time < MIN_TICK_TIME {
            return;
        }

        let friction = friction.max(0.0);
        let max_accel = ctx.config.max_acceleration;
        let max_speed = ctx.max_speed();

        let requested = self.apply_requested_move(ctx, delta_time, max_accel, max_speed, friction);
        let (requested_accel, requested_speed) = requested.unwrap_or((Vec3::ZERO, 0.0));
        let zero_requested_accel = requested.is_none();

        let max_input_speed = (max_speed * ctx.state.analog_input_modifier).max(ctx.min_analog_speed());
        let max_speed = requested_speed.max(max_input_speed);

        let acceleration = ctx.state.acceleration;
        let zero_accel = acceleration == Vec3::ZERO;
        let over_max = is_exceeding_max_speed(ctx.state.velocity, max_speed);

        if (zero_accel && zero_requested_accel) || over_max {
            let old_velocity = ctx.state.velocity;
            let braking_friction = if ctx.config.use_separate_braking_friction {
                ctx.config.braking_friction
            } else {
                friction
            };
            self.apply_velocity_braking(ctx, delta_time, braking_friction, braking_deceleration);

            // Braking alone must not drop below max speed while still
            // accelerating along the old velocity.
            if over_max
                && ctx.state.velocity.length_squared() < max_speed * max_speed
                && acceleration.dot(old_velocity) > 0.0
            {
                ctx.state.velocity = safe_normal(old_velocity) * max_speed;
            }
        } else if !zero_accel {
            // Friction limits how quickly the velocity turns toward the input.
            let accel_dir = safe_normal(acceleration);
            let velocity = ctx.state.velocity;
            let speed = velocity.length();
            ctx.state.velocity = velocity - (velocity - accel_dir * speed) * (delta_time * friction).min(1.0);
        }

        if fluid {
            ctx.state.velocity *= 1.0 - (friction * delta_time).min(1.0);
        }

        if !zero_accel {
            let limit = if is_exceeding_max_speed(ctx.state.velocity, max_input_speed) {
                ctx.state.velocity.length()
            } else {
                max_input_speed
            };
            ctx.state.velocity = clamp_to_max_size(ctx.state.velocity + acceleration * delta_time, limit);
        }

        if !zero_requested_accel {
            let limit = if is_exceeding_max_speed(ctx.state.velocity, requested_speed) {
                ctx.state.velocity.length()
            } else {
                requested_speed
            };
            ctx.state.velocity = clamp_to_max_size(ctx.state.velocity + requested_accel * delta_time, limit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::CollisionWorld;
    use crate::movement::context::TestRig;
    use crate::movement::MovementMode;

    const DT: f32 = 1.0 / 60.0;

    fn walking_rig() -> TestRig {
        let mut rig = TestRig::new(CollisionWorld::new(), Vec3::new(0.0, 0.0, 90.0));
        rig.state.mode = MovementMode::Walking;
        rig
    }

    fn calc(rig: &mut TestRig) {
        let friction = rig.config.ground_friction;
        let braking = rig.config.braking_deceleration_walking;
        rig.ctx().calc_velocity(DT, friction, false, braking);
    }

    #[test]
    fn test_accelerates_toward_input() {
        let mut rig = walking_rig();
        rig.state.acceleration = Vec3::X * rig.config.max_acceleration;
        rig.state.analog_input_modifier = 1.0;

        calc(&mut rig);

        let expected = rig.config.max_acceleration * DT;
        assert!((rig.state.velocity.x - expected).abs() < 1e-3);
        assert_eq!(rig.state.velocity.y, 0.0);
    }

    #[test]
    fn test_gentle_input_respects_min_analog_speed() {
        let mut rig = walking_rig();
        rig.config.min_analog_walk_speed = 300.0;
        rig.state.acceleration = Vec3::X * rig.config.max_acceleration * 0.1;
        rig.state.analog_input_modifier = 0.1;

        for _ in 0..600 {
            calc(&mut rig);
        }
        let speed = rig.state.velocity.length();
        assert!((speed - 300.0).abs() < 1.0, "Gentle input should reach the analog floor, at {speed}");

        rig.config.min_analog_walk_speed = 0.0;
        for _ in 0..600 {
            calc(&mut rig);
        }
        let speed = rig.state.velocity.length();
        assert!((speed - 60.0).abs() < 1.0, "Without a floor the cap scales with input, at {speed}");
    }

    #[test]
    fn test_speed_never_exceeds_max() {
        let mut rig = walking_rig();
        rig.state.acceleration = Vec3::new(1.0, 1.0, 0.0).normalize() * rig.config.max_acceleration;
        rig.state.analog_input_modifier = 1.0;

        for _ in 0..300 {
            calc(&mut rig);
            assert!(
                rig.state.velocity.length() <= rig.config.max_walk_speed + 1e-2,
                "Speed {} over max",
                rig.state.velocity.length()
            );
        }
        assert!((rig.state.velocity.length() - rig.config.max_walk_speed).abs() < 1.0);
    }

    #[test]
    fn test_braking_stops_without_reversing() {
        let mut rig = walking_rig();
        rig.state.velocity = Vec3::new(300.0, 0.0, 0.0);

        let mut last = rig.state.velocity.length();
        for _ in 0..120 {
            calc(&mut rig);
            assert!(rig.state.velocity.x >= 0.0, "Braking must not reverse direction");
            assert!(rig.state.velocity.length() <= last);
            last = rig.state.velocity.length();
        }
        assert_eq!(rig.state.velocity, Vec3::ZERO);
    }

    #[test]
    fn test_over_max_with_opposing_input_never_speeds_up() {
        for start in [700.0, 1000.0, 1500.0, 3000.0] {
            let mut rig = walking_rig();
            rig.state.velocity = Vec3::new(start, 0.0, 0.0);
            rig.state.acceleration = Vec3::new(-1.0, 0.3, 0.0).normalize() * rig.config.max_acceleration;
            rig.state.analog_input_modifier = 1.0;

            calc(&mut rig);

            let speed = rig.state.velocity.length();
            assert!(speed <= start, "Speed rose from {start} to {speed}");
        }
    }

    #[test]
    fn test_over_max_with_forward_input_keeps_max_speed() {
        let mut rig = walking_rig();
        rig.state.velocity = Vec3::new(1000.0, 0.0, 0.0);
        rig.state.acceleration = Vec3::X * rig.config.max_acceleration;
        rig.state.analog_input_modifier = 1.0;

        calc(&mut rig);

        let speed = rig.state.velocity.length();
        assert!(speed < 1000.0);
        assert!(speed >= rig.config.max_walk_speed - 1e-2, "Braking dropped below max speed: {speed}");
    }

    #[test]
    fn test_requested_move_ramps_up_then_holds() {
        let mut rig = walking_rig();
        rig.state.requested_velocity = Vec3::new(100.0, 0.0, 0.0);
        rig.state.flags.set(MovementFlags::HAS_REQUESTED_VELOCITY, true);

        for _ in 0..10 {
            calc(&mut rig);
            assert!(rig.state.velocity.length() <= 100.0 + 1e-3);
        }
        assert!((rig.state.velocity.x - 100.0).abs() < 1e-2);
    }

    #[test]
    fn test_requested_move_decelerates_instantly() {
        let mut rig = walking_rig();
        rig.state.velocity = Vec3::new(500.0, 0.0, 0.0);
        rig.state.requested_velocity = Vec3::new(0.0, 50.0, 0.0);
        rig.state.flags.set(MovementFlags::HAS_REQUESTED_VELOCITY, true);

        calc(&mut rig);

        assert!((rig.state.velocity - Vec3::new(0.0, 50.0, 0.0)).length() < 1e-3);
    }

    #[test]
    fn test_fluid_drag() {
        let mut rig = walking_rig();
        rig.state.mode = MovementMode::Swimming;
        rig.config.braking_friction_factor = 0.0;
        rig.state.velocity = Vec3::new(0.0, 0.0, 100.0);
        rig.ctx().calc_velocity(0.1, 1.0, true, 0.0);
        assert!((rig.state.velocity.z - 90.0).abs() < 1e-3);
    }

    #[test]
    fn test_root_motion_skips_integration() {
        let mut rig = walking_rig();
        rig.state.velocity = Vec3::X * 300.0;
        rig.state.root_motion_velocity = Some(Vec3::X * 300.0);
        calc(&mut rig);
        assert_eq!(rig.state.velocity, Vec3::X * 300.0);
    }

    #[test]
    fn test_exceeding_max_speed_tolerance() {
        assert!(!is_exceeding_max_speed(Vec3::X * 100.4, 100.0));
        assert!(is_exceeding_max_speed(Vec3::X * 101.0, 100.0));
        assert!(is_exceeding_max_speed(Vec3::X, -5.0));
    }
}
