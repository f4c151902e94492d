//! Locomotion configuration.
//!
//! All movement tunables are grouped here and handed to every component at
//! construction. Values use centimetres and seconds.

use serde::{Deserialize, Serialize};

use crate::collision::ContentFlags;
use crate::error::ConfigError;

/// Configuration for character locomotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocomotionConfig {
    // ========================================================================
    // Gravity
    // ========================================================================
    /// Ambient gravity along world Z (cm/s²).
    pub world_gravity_z: f32,

    /// Signed multiplier on ambient gravity.
    pub gravity_scale: f32,

    // ========================================================================
    // Floor Detection
    // ========================================================================
    /// Minimum dot of a floor's impact normal with the capsule up axis.
    /// 0.71 ≈ 44.8 degrees.
    pub walkable_floor_z: f32,

    /// Lower bound of the floor clearance band kept while walking.
    pub min_floor_dist: f32,

    /// Upper bound of the floor clearance band kept while walking.
    pub max_floor_dist: f32,

    /// Inset from the capsule rim inside which floor hits are trusted.
    pub edge_reject_distance: f32,

    /// Floor hits this far from the capsule axis or further are re-probed
    /// with a smaller capsule before being rejected. Zero disables perching.
    pub perch_radius_threshold: f32,

    /// Extra depth allowed below the floor band when perched.
    pub perch_additional_height: f32,

    /// Query the floor every tick even when stationary on a static base.
    pub always_check_floor: bool,

    // ========================================================================
    // Stairs and Ledges
    // ========================================================================
    /// Maximum obstacle height a character steps up onto.
    pub max_step_height: f32,

    /// When false, walking characters refuse to step off walkable floor.
    pub can_walk_off_ledges: bool,

    /// Maximum floor drop accepted by the sideways ledge probe.
    pub ledge_check_threshold: f32,

    // ========================================================================
    // Speeds
    // ========================================================================
    pub max_walk_speed: f32,
    pub max_fly_speed: f32,
    pub max_swim_speed: f32,
    pub max_custom_speed: f32,

    /// Lowest speed partial analog input may cap walking and falling at.
    pub min_analog_walk_speed: f32,

    /// Maximum input acceleration (cm/s²).
    pub max_acceleration: f32,

    // ========================================================================
    // Friction and Braking
    // ========================================================================
    /// Ground friction while walking.
    pub ground_friction: f32,

    /// Multiplier on friction used while braking.
    pub braking_friction_factor: f32,

    /// Friction used while braking when `use_separate_braking_friction` is set.
    pub braking_friction: f32,

    pub use_separate_braking_friction: bool,

    pub braking_deceleration_walking: f32,
    pub braking_deceleration_falling: f32,
    pub braking_deceleration_flying: f32,
    pub braking_deceleration_swimming: f32,

    /// Braking is integrated in sub-steps no longer than this.
    pub braking_sub_step_time: f32,

    /// Requested (path-following) moves accelerate instead of snapping.
    pub requested_move_use_acceleration: bool,

    // ========================================================================
    // Falling
    // ========================================================================
    /// Fraction of input acceleration applied while falling.
    pub air_control: f32,

    /// Air control multiplier while nearly stationary on the ground plane.
    pub air_control_boost_multiplier: f32,

    /// Ground-plane speed below which the air control boost applies.
    pub air_control_boost_velocity_threshold: f32,

    /// Lateral friction while falling.
    pub falling_lateral_friction: f32,

    /// Maximum speed along the gravity axis.
    pub terminal_velocity: f32,

    /// Speed along the up axis given by a jump.
    pub jump_z_velocity: f32,

    /// Fraction of jump speed given when pushed off another character.
    pub jump_off_jump_z_factor: f32,

    /// Mass (kg) dividing non-velocity-change impulses and forces.
    pub mass: f32,

    // ========================================================================
    // Fluids
    // ========================================================================
    pub fluid_friction: f32,

    /// Fraction of gravity cancelled when fully immersed.
    pub buoyancy: f32,

    pub can_ever_swim: bool,

    // ========================================================================
    // Simulation
    // ========================================================================
    /// Longest sub-step of a movement tick (seconds).
    pub max_simulation_time_step: f32,

    /// Maximum sub-steps per movement tick.
    pub max_simulation_iterations: u32,

    /// Maximum distance a penetration push-out may move the capsule.
    pub max_depenetration: f32,

    /// Preserve horizontal speed when walking up and down ramps.
    pub maintain_horizontal_ground_velocity: bool,

    /// Batch every tick's moves and publish them once at the end.
    pub enable_scoped_movement_updates: bool,

    /// Sweep while nav-walking instead of teleporting to the projected floor.
    pub sweep_while_nav_walking: bool,

    /// Content flags that block the capsule.
    pub collision_mask: ContentFlags,

    // ========================================================================
    // Movement Bases
    // ========================================================================
    pub impart_base_velocity_x: bool,
    pub impart_base_velocity_y: bool,
    pub impart_base_velocity_z: bool,
    pub impart_base_angular_velocity: bool,

    /// Do not rotate with a rotating base.
    pub ignore_base_rotation: bool,

    /// Seed for the deterministic perch-ditch nudge.
    pub random_seed: u32,
}

impl Default for LocomotionConfig {
    fn default() -> Self {
        Self {
            // Gravity
            world_gravity_z: -980.0,
            gravity_scale: 1.0,

            // Floor detection
            walkable_floor_z: 0.71,
            min_floor_dist: 1.9,
            max_floor_dist: 2.4,
            edge_reject_distance: 0.15,
            perch_radius_threshold: 0.0,
            perch_additional_height: 40.0,
            always_check_floor: false,

            // Stairs and ledges
            max_step_height: 45.0,
            can_walk_off_ledges: true,
            ledge_check_threshold: 4.0,

            // Speeds
            max_walk_speed: 600.0,
            max_fly_speed: 600.0,
            max_swim_speed: 300.0,
            max_custom_speed: 600.0,
            min_analog_walk_speed: 0.0,
            max_acceleration: 2048.0,

            // Friction and braking
            ground_friction: 8.0,
            braking_friction_factor: 2.0,
            braking_friction: 0.0,
            use_separate_braking_friction: false,
            braking_deceleration_walking: 2048.0,
            braking_deceleration_falling: 0.0,
            braking_deceleration_flying: 0.0,
            braking_deceleration_swimming: 0.0,
            braking_sub_step_time: 1.0 / 33.0,
            requested_move_use_acceleration: true,

            // Falling
            air_control: 0.05,
            air_control_boost_multiplier: 2.0,
            air_control_boost_velocity_threshold: 25.0,
            falling_lateral_friction: 0.0,
            terminal_velocity: 4000.0,
            jump_z_velocity: 420.0,
            jump_off_jump_z_factor: 0.5,
            mass: 100.0,

            // Fluids
            fluid_friction: 0.3,
            buoyancy: 1.0,
            can_ever_swim: true,

            // Simulation
            max_simulation_time_step: 0.05,
            max_simulation_iterations: 8,
            max_depenetration: 100.0,
            maintain_horizontal_ground_velocity: true,
            enable_scoped_movement_updates: true,
            sweep_while_nav_walking: true,
            collision_mask: ContentFlags::MASK_PAWN_MOVEMENT,

            // Movement bases
            impart_base_velocity_x: true,
            impart_base_velocity_y: true,
            impart_base_velocity_z: true,
            impart_base_angular_velocity: true,
            ignore_base_rotation: false,
            random_seed: 0x5eed,
        }
    }
}

impl LocomotionConfig {
    /// Floaty movement for low-gravity worlds with strong air control.
    pub fn low_gravity() -> Self {
        Self {
            gravity_scale: 0.25,
            air_control: 0.35,
            air_control_boost_multiplier: 3.0,
            jump_z_velocity: 300.0,
            terminal_velocity: 1500.0,
            ..Default::default()
        }
    }

    /// Careful movement: perching, no walking off ledges, floor every tick.
    pub fn precise() -> Self {
        Self {
            perch_radius_threshold: 15.0,
            can_walk_off_ledges: false,
            always_check_floor: true,
            max_simulation_time_step: 1.0 / 60.0,
            max_simulation_iterations: 12,
            ..Default::default()
        }
    }

    /// Check the values other code relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(ConfigError::OutOfRange {
                    field,
                    requirement: "finite and non-negative",
                    value,
                })
            }
        }

        if !(0.0..=1.0).contains(&self.walkable_floor_z) {
            return Err(ConfigError::OutOfRange {
                field: "walkable_floor_z",
                requirement: "within [0, 1]",
                value: self.walkable_floor_z,
            });
        }
        non_negative("min_floor_dist", self.min_floor_dist)?;
        non_negative("max_floor_dist", self.max_floor_dist)?;
        if self.min_floor_dist > self.max_floor_dist {
            return Err(ConfigError::FloorBand {
                min: self.min_floor_dist,
                max: self.max_floor_dist,
            });
        }
        non_negative("edge_reject_distance", self.edge_reject_distance)?;
        non_negative("perch_radius_threshold", self.perch_radius_threshold)?;
        non_negative("max_step_height", self.max_step_height)?;
        non_negative("max_acceleration", self.max_acceleration)?;
        non_negative("min_analog_walk_speed", self.min_analog_walk_speed)?;
        non_negative("terminal_velocity", self.terminal_velocity)?;
        if !(self.mass > 0.0) || !self.mass.is_finite() {
            return Err(ConfigError::OutOfRange {
                field: "mass",
                requirement: "finite and positive",
                value: self.mass,
            });
        }
        if !(self.max_simulation_time_step > 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "max_simulation_time_step",
                requirement: "positive",
                value: self.max_simulation_time_step,
            });
        }
        if self.max_simulation_iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        Ok(())
    }

    /// Whether the ground-plane component of base velocity is inherited.
    pub fn imparts_any_base_velocity(&self) -> bool {
        self.impart_base_velocity_x || self.impart_base_velocity_y || self.impart_base_velocity_z
    }
}
