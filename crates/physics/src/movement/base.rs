//! Riding movement bases.
//!
//! A character standing on a dynamic base follows the base's motion before
//! its own physics runs, and inherits the base's velocity when it leaves.

use glam::Vec3;

use super::context::MoveContext;
use super::state::{MovementFlags, MovementMode};
use crate::math::{nearly_equal, project_onto_plane, safe_normal, KINDA_SMALL_NUMBER};

/// Fraction of max speed used to push away from a base that refuses riders.
const JUMP_OFF_SPEED_FACTOR: f32 = 0.85;

/// Rotations closer than this (per component) count as unchanged.
const BASE_ROTATION_TOLERANCE: f32 = 1.0e-4;

impl MoveContext<'_> {
    /// Velocity handed to the character when it leaves its base.
    ///
    /// Only dynamic bases impart velocity. The angular part is the base's
    /// tangential velocity at the bottom of the capsule.
    pub fn imparted_base_velocity(&self) -> Vec3 {
        let Some(base) = self.state.base.base else {
            return Vec3::ZERO;
        };
        if !self.world.is_dynamic_base(base) {
            return Vec3::ZERO;
        }

        let mut base_velocity = self.world.base_velocity(base);
        if self.config.impart_base_angular_velocity {
            if let Some(transform) = self.world.base_transform(base) {
                let foot = self.location() - self.up() * self.capsule().half_height;
                let angular = self.world.base_angular_velocity(base);
                base_velocity += angular.cross(foot - transform.location);
            }
        }

        Vec3::new(
            if self.config.impart_base_velocity_x { base_velocity.x } else { 0.0 },
            if self.config.impart_base_velocity_y { base_velocity.y } else { 0.0 },
            if self.config.impart_base_velocity_z { base_velocity.z } else { 0.0 },
        )
    }

    /// Push the character off a base it may not stand on and start falling.
    pub fn jump_off(&mut self) {
        if self.state.flags.has(MovementFlags::PERFORMING_JUMP_OFF) {
            return;
        }
        self.state.flags.set(MovementFlags::PERFORMING_JUMP_OFF, true);

        let max_speed = self.max_speed() * JUMP_OFF_SPEED_FACTOR;
        let up = self.up();
        let direction = safe_normal(self.state.rng.planar_direction(up));
        self.state.velocity += direction * max_speed;

        let mut planar = project_onto_plane(self.state.velocity, up);
        if planar.length() > max_speed {
            planar = project_onto_plane(safe_normal(self.state.velocity) * max_speed, up);
        }
        self.state.velocity = planar + up * (self.config.jump_z_velocity * self.config.jump_off_jump_z_factor);
        log::debug!("jumping off base {:?}", self.state.base.base);
        self.set_movement_mode(MovementMode::Falling);

        self.state.flags.set(MovementFlags::PERFORMING_JUMP_OFF, false);
    }

    /// Follow the base's motion since its transform was last saved.
    pub fn update_based_movement(&mut self, delta_time: f32) {
        if !self.has_valid_data() || delta_time <= 0.0 {
            return;
        }
        let Some(base) = self.state.base.base else {
            return;
        };
        if !self.world.is_dynamic_base(base) {
            return;
        }
        let Some(new_transform) = self.world.base_transform(base) else {
            log::debug!("movement base {base} is gone");
            self.set_base(None);
            return;
        };
        let Some(old_transform) = self.state.base.last_transform else {
            self.state.base.last_transform = Some(new_transform);
            return;
        };

        let rotation_changed = !old_transform
            .rotation
            .abs_diff_eq(new_transform.rotation, BASE_ROTATION_TOLERANCE);
        if !rotation_changed && old_transform.location == new_transform.location {
            return;
        }

        let mut rotation = self.rotation();
        if rotation_changed && !self.config.ignore_base_rotation {
            let delta_rotation = new_transform.rotation * old_transform.rotation.inverse();
            rotation = (delta_rotation * rotation).normalize();
        }

        // Follow with the foot of the capsule, not its centre.
        let foot_offset = self.up() * self.capsule().half_height;
        let location = self.location();
        let local_foot = old_transform.inverse_transform_point(location - foot_offset);
        let target = new_transform.transform_point(local_foot) + foot_offset;
        let delta = target - location;

        let hit = self.move_component(delta, rotation, true);
        if !nearly_equal(self.location(), target, KINDA_SMALL_NUMBER) {
            log::debug!("could not follow base {base}: blocked at {}", hit.impact_point);
        }
    }

    /// Remember the base transform so the next tick can follow its motion.
    pub fn save_base_location(&mut self) {
        if let Some(base) = self.state.base.base {
            self.state.base.last_transform = self.world.base_transform(base);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{CollisionWorld, ContentFlags, SurfaceFlags, SurfaceProperties};
    use crate::movement::context::TestRig;
    use glam::Quat;

    /// Static ground far below and a platform whose top is at z = 0.
    fn platform_world() -> (CollisionWorld, u32) {
        let mut world = CollisionWorld::new();
        world.add_box(Vec3::new(0.0, 0.0, -1050.0), Vec3::new(5000.0, 5000.0, 50.0), ContentFlags::SOLID);
        let platform = world.add_box(Vec3::new(0.0, 0.0, -10.0), Vec3::new(300.0, 300.0, 10.0), ContentFlags::SOLID);
        (world, platform)
    }

    fn rider(world: CollisionWorld) -> TestRig {
        let mut rig = TestRig::new(world, Vec3::new(0.0, 0.0, 90.5));
        rig.ctx().set_movement_mode(MovementMode::Walking);
        rig
    }

    #[test]
    fn test_follows_moving_platform() {
        let (world, platform) = platform_world();
        let mut rig = rider(world);
        assert_eq!(rig.state.base.base, Some(platform));
        let start = rig.state.body.location();

        rig.world.move_body(platform, Vec3::new(50.0, 0.0, -10.0), Quat::IDENTITY, 0.1);
        rig.ctx().update_based_movement(0.1);

        let moved = rig.state.body.location() - start;
        assert!((moved.x - 50.0).abs() < 0.01, "Should ride along, moved {moved}");
        assert!(moved.z.abs() < 0.01);
    }

    #[test]
    fn test_rotating_platform_carries_rider() {
        let (world, platform) = platform_world();
        let mut rig = TestRig::new(world, Vec3::new(100.0, 0.0, 90.5));
        rig.ctx().set_movement_mode(MovementMode::Walking);

        let spin = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        rig.world.move_body(platform, Vec3::new(0.0, 0.0, -10.0), spin, 0.1);
        rig.ctx().update_based_movement(0.1);

        let location = rig.state.body.location();
        assert!(location.x.abs() < 0.5 && (location.y - 100.0).abs() < 0.5, "Ended at {location}");
        assert!(rig.state.body.forward().dot(Vec3::Y) > 0.999);
    }

    #[test]
    fn test_static_base_imparts_nothing() {
        let (world, _) = platform_world();
        let mut rig = rider(world);
        rig.ctx().save_base_location();
        assert_eq!(rig.ctx().imparted_base_velocity(), Vec3::ZERO);
    }

    #[test]
    fn test_leaving_moving_base_imparts_velocity() {
        let (world, platform) = platform_world();
        let mut rig = rider(world);
        rig.world.move_body(platform, Vec3::new(20.0, 0.0, -10.0), Quat::IDENTITY, 0.1);

        let imparted = rig.ctx().imparted_base_velocity();
        assert!((imparted.x - 200.0).abs() < 0.01, "Imparted {imparted}");

        rig.config.impart_base_velocity_x = false;
        assert_eq!(rig.ctx().imparted_base_velocity().x, 0.0);
    }

    #[test]
    fn test_no_base_surface_jumps_off() {
        let (mut world, platform) = platform_world();
        world.set_surface(
            platform,
            SurfaceProperties {
                flags: SurfaceFlags::NO_BASE,
                ..Default::default()
            },
        );
        let mut rig = rider(world);

        assert_eq!(rig.state.mode, MovementMode::Falling);
        assert!(rig.state.velocity.z > 0.0);
        let planar = project_onto_plane(rig.state.velocity, Vec3::Z).length();
        assert!(planar <= rig.config.max_walk_speed * JUMP_OFF_SPEED_FACTOR + 0.01);
        assert!(!rig.state.flags.has(MovementFlags::PERFORMING_JUMP_OFF));
    }
}
