//! The locomotion state machine.
//!
//! This is the host's entry point. It owns one character's configuration,
//! pluggable components and state, collects input between ticks and runs a
//! movement tick against a [`MovementWorld`].

use glam::Vec3;

use super::body::CapsuleTransform;
use super::config::LocomotionConfig;
use super::context::{Components, MoveContext, TickReport};
use super::floor::FloorResult;
use super::gravity::GravityModel;
use super::modes::MovementPhysics;
use super::observer::MovementObserver;
use super::state::{MovementFlags, MovementMode, MovementState};
use crate::collision::{BodyId, CapsuleShape, MovementWorld};
use crate::error::{ensure_finite, LocomotionError};
use crate::math::{clamp_to_max_size, project_onto_plane, MIN_TICK_TIME, SMALL_NUMBER};

/// How far below the spawn point the floor is searched for.
const SPAWN_TRACE_DISTANCE: f32 = 1000.0;

/// Distance a spawn placement is pulled back from the floor it hit.
const SPAWN_PULLBACK: f32 = 0.1;

/// Gravity-aware character locomotion.
///
/// Handles one character's movement:
/// - Walking, nav-walking, falling, flying, swimming and custom modes
/// - Floor detection, stairs, ledges and slopes
/// - Moving platforms
/// - Arbitrary gravity directions
///
/// # Example
///
/// ```ignore
/// let mut machine = LocomotionStateMachine::new(LocomotionConfig::default(), CapsuleShape::new(34.0, 88.0))?;
/// machine.spawn_at(&world, spawn_point, &mut NullObserver);
///
/// // Each frame:
/// machine.set_input_acceleration(input);
/// machine.perform_movement_tick(&world, delta_time, &mut NullObserver)?;
/// ```
#[derive(Debug)]
pub struct LocomotionStateMachine {
    config: LocomotionConfig,
    components: Components,
    state: MovementState,
}

impl LocomotionStateMachine {
    /// Create a state machine with the default components.
    ///
    /// The character starts at the origin in [`MovementMode::None`]; place it
    /// with [`spawn_at`](Self::spawn_at).
    pub fn new(config: LocomotionConfig, capsule: CapsuleShape) -> Result<Self, LocomotionError> {
        Self::with_components(config, capsule, Components::default())
    }

    /// Create a state machine with custom floor, velocity, step, slide or
    /// mode components.
    pub fn with_components(
        config: LocomotionConfig,
        capsule: CapsuleShape,
        components: Components,
    ) -> Result<Self, LocomotionError> {
        config.validate()?;
        if !capsule.is_valid() {
            return Err(LocomotionError::InvalidCapsule {
                radius: capsule.radius,
                half_height: capsule.half_height,
            });
        }

        let gravity = GravityModel::new(config.world_gravity_z, config.gravity_scale);
        let mut state = MovementState::new(capsule, Vec3::ZERO, gravity, config.random_seed);
        state.body.collision_mask = config.collision_mask;

        Ok(Self {
            config,
            components,
            state,
        })
    }

    /// Use `physics` for `MovementMode::Custom(sub_mode)`, returning the
    /// strategy it replaces.
    pub fn register_custom_mode(
        &mut self,
        sub_mode: u8,
        physics: Box<dyn MovementPhysics>,
    ) -> Option<Box<dyn MovementPhysics>> {
        self.components.modes.register_custom(sub_mode, physics)
    }

    /// Run `f` with a [`MoveContext`] over this character.
    pub fn with_context<R>(
        &mut self,
        world: &dyn MovementWorld,
        observer: &mut dyn MovementObserver,
        f: impl FnOnce(&mut MoveContext<'_>) -> R,
    ) -> R {
        let mut ctx = MoveContext::new(&self.config, world, &self.components, &mut self.state, observer);
        f(&mut ctx)
    }

    /// Place the character at `location` with a fresh state.
    ///
    /// Sweeps down along gravity to rest the capsule on the floor, then picks
    /// the default movement mode. Gravity settings, the collision mask and the
    /// capsule's own body id carry over.
    pub fn spawn_at(&mut self, world: &dyn MovementWorld, location: Vec3, observer: &mut dyn MovementObserver) {
        let mut state = MovementState::new(
            self.state.body.capsule,
            location,
            self.state.gravity.clone(),
            self.config.random_seed,
        );
        state.body.collision_mask = self.state.body.collision_mask;
        state.body.collision_enabled = self.state.body.collision_enabled;
        state.body.self_id = self.state.body.self_id;
        self.state = state;

        self.with_context(world, observer, |ctx| {
            let down = ctx.gravity_direction(true);
            let rotation = ctx.rotation();
            if ctx.state.body.collision_enabled {
                let hit = ctx.world.sweep_capsule(
                    location,
                    location + down * SPAWN_TRACE_DISTANCE,
                    rotation,
                    ctx.capsule(),
                    ctx.filter(),
                );
                if hit.is_valid_blocking_hit() && !hit.start_penetrating {
                    let resting = hit.location - down * SPAWN_PULLBACK.min(hit.distance);
                    ctx.state.body.set_transform(resting, rotation);
                }
            }
            ctx.state.last_update_location = ctx.location();
            ctx.set_default_movement_mode();
            log::debug!("spawned at {} in {}", ctx.location(), ctx.state.mode.name());
        });
    }

    // ========================================================================
    // Input
    // ========================================================================

    /// Set the input direction for the coming ticks.
    ///
    /// `input` is a direction scaled by how hard it is pushed; its length is
    /// clamped to 1. On the ground or in the air the component along the
    /// capsule up axis is dropped.
    pub fn set_input_acceleration(&mut self, input: Vec3) {
        let constrained = self.constrain_input_acceleration(input);
        let max_accel = self.config.max_acceleration;
        let acceleration = clamp_to_max_size(constrained, 1.0) * max_accel;

        self.state.acceleration = acceleration;
        self.state.analog_input_modifier = if max_accel > 0.0 && acceleration.length_squared() > 0.0 {
            (acceleration.length() / max_accel).clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    fn constrain_input_acceleration(&self, input: Vec3) -> Vec3 {
        let up = self.state.body.up();
        if input.dot(up) != 0.0 && (self.is_moving_on_ground() || self.is_falling()) {
            project_onto_plane(input, up)
        } else {
            input
        }
    }

    /// Ask to move at `velocity` on the next tick.
    ///
    /// The request is used for one tick; path followers issue it every tick.
    /// With `force_max_speed` the character moves at max speed in the
    /// requested direction.
    pub fn request_direct_move(&mut self, velocity: Vec3, force_max_speed: bool) {
        self.state.requested_velocity = velocity;
        self.state.flags.set(MovementFlags::HAS_REQUESTED_VELOCITY, true);
        self.state
            .flags
            .set(MovementFlags::REQUESTED_MOVE_WITH_MAX_SPEED, force_max_speed);
    }

    pub fn clear_requested_move(&mut self) {
        self.state.requested_velocity = Vec3::ZERO;
        self.state.flags.set(MovementFlags::HAS_REQUESTED_VELOCITY, false);
        self.state.flags.set(MovementFlags::REQUESTED_MOVE_WITH_MAX_SPEED, false);
    }

    /// Drive the next tick with a root-motion velocity instead of integrated
    /// velocity. `None` cancels it.
    pub fn set_root_motion(&mut self, velocity: Option<Vec3>) {
        self.state.root_motion_velocity = velocity;
    }

    // ========================================================================
    // Forces
    // ========================================================================

    /// Jump on the next tick.
    ///
    /// Returns false when not on the ground. The speed along gravity is
    /// replaced by the jump speed and the character starts falling.
    pub fn jump(&mut self) -> bool {
        if !self.is_moving_on_ground() || self.config.jump_z_velocity <= 0.0 {
            return false;
        }
        let down = self.state.gravity.gravity_direction(true);
        let velocity = project_onto_plane(self.state.velocity, down) - down * self.config.jump_z_velocity;
        self.state.pending_launch = Some(velocity);
        self.state.flags.set(MovementFlags::NOTIFY_APEX, true);
        log::debug!("jump with velocity {velocity}");
        true
    }

    /// Replace the velocity with `velocity` and start falling on the next tick.
    pub fn launch(&mut self, velocity: Vec3) {
        self.state.pending_launch = Some(velocity);
    }

    /// Add an impulse on the next tick. With `velocity_change` it is applied
    /// directly, otherwise it is divided by the character's mass.
    pub fn add_impulse(&mut self, impulse: Vec3, velocity_change: bool) {
        if impulse == Vec3::ZERO {
            return;
        }
        let delta = if velocity_change { impulse } else { impulse / self.config.mass };
        self.state.pending_impulse += delta;
    }

    /// Add a force acting during the next tick only.
    pub fn add_force(&mut self, force: Vec3) {
        if force == Vec3::ZERO {
            return;
        }
        self.state.pending_force += force / self.config.mass;
    }

    // ========================================================================
    // Gravity
    // ========================================================================

    pub fn gravity(&self) -> &GravityModel {
        &self.state.gravity
    }

    /// Override the gravity direction. A zero vector returns to world gravity.
    ///
    /// The capsule turns to the new up axis at the start of the next tick.
    pub fn set_gravity_direction(&mut self, direction: Vec3) {
        self.state.gravity.set_gravity_direction(direction);
    }

    /// Gravity direction, optionally never zero.
    pub fn gravity_direction(&self, avoid_zero: bool) -> Vec3 {
        self.state.gravity.gravity_direction(avoid_zero)
    }

    pub fn set_gravity_scale(&mut self, scale: f32) {
        self.state.gravity.set_gravity_scale(scale);
    }

    pub fn set_world_gravity_z(&mut self, gravity_z: f32) {
        self.state.gravity.set_world_gravity_z(gravity_z);
    }

    // ========================================================================
    // Modes and Placement
    // ========================================================================

    /// Switch modes, running the mode-changed side effects.
    pub fn set_movement_mode(
        &mut self,
        world: &dyn MovementWorld,
        mode: MovementMode,
        observer: &mut dyn MovementObserver,
    ) {
        self.with_context(world, observer, |ctx| ctx.set_movement_mode(mode));
    }

    /// Swimming in water, walking on a floor, falling otherwise.
    pub fn set_default_movement_mode(&mut self, world: &dyn MovementWorld, observer: &mut dyn MovementObserver) {
        self.with_context(world, observer, |ctx| ctx.set_default_movement_mode());
    }

    /// Move to `location` without sweeping.
    ///
    /// The next tick re-checks the floor and does not derive velocity from
    /// the displacement.
    pub fn teleport(&mut self, location: Vec3) {
        let rotation = self.state.body.rotation();
        self.state.body.set_transform(location, rotation);
        self.state.flags.set(MovementFlags::JUST_TELEPORTED, true);
        self.state.floor.mark_dirty();
    }

    /// Replace the configuration.
    pub fn set_config(&mut self, config: LocomotionConfig) -> Result<(), LocomotionError> {
        config.validate()?;
        self.state.body.collision_mask = config.collision_mask;
        self.config = config;
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &LocomotionConfig {
        &self.config
    }

    pub fn components(&self) -> &Components {
        &self.components
    }

    pub fn state(&self) -> &MovementState {
        &self.state
    }

    /// Direct access to the state, for hosts that restore snapshots.
    pub fn state_mut(&mut self) -> &mut MovementState {
        &mut self.state
    }

    pub fn location(&self) -> Vec3 {
        self.state.body.location()
    }

    /// Transform as last published, outside any open batch.
    pub fn transform(&self) -> CapsuleTransform {
        self.state.body.committed()
    }

    /// Capsule up axis.
    pub fn up(&self) -> Vec3 {
        self.state.body.up()
    }

    pub fn velocity(&self) -> Vec3 {
        self.state.velocity
    }

    pub fn acceleration(&self) -> Vec3 {
        self.state.acceleration
    }

    pub fn mode(&self) -> MovementMode {
        self.state.mode
    }

    pub fn current_floor(&self) -> &FloorResult {
        self.state.floor.current()
    }

    pub fn movement_base(&self) -> Option<BodyId> {
        self.state.base.base
    }

    pub fn is_moving_on_ground(&self) -> bool {
        self.state.mode.is_moving_on_ground()
    }

    pub fn is_falling(&self) -> bool {
        self.state.mode == MovementMode::Falling
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Simulate one frame of `delta_time` seconds.
    ///
    /// Does nothing in [`MovementMode::None`], for non-positive time steps or
    /// when the capsule transform is not finite. Fails only when velocity
    /// stops being finite.
    pub fn perform_movement_tick(
        &mut self,
        world: &dyn MovementWorld,
        delta_time: f32,
        observer: &mut dyn MovementObserver,
    ) -> Result<TickReport, LocomotionError> {
        let mode = self.state.mode;
        if !delta_time.is_finite()
            || delta_time < MIN_TICK_TIME
            || mode == MovementMode::None
            || !self.state.has_valid_data()
        {
            return Ok(TickReport {
                mode_before: mode,
                mode_after: mode,
                ..TickReport::default()
            });
        }

        self.with_context(world, observer, |ctx| ctx.perform_movement(delta_time))
    }
}

// ============================================================================
// Tick Stages
// ============================================================================

impl MoveContext<'_> {
    /// One full movement tick.
    pub fn perform_movement(&mut self, delta_time: f32) -> Result<TickReport, LocomotionError> {
        self.update_component_rotation();

        // Moved from outside since the last tick.
        if self.is_moving_on_ground() && self.location() != self.state.last_update_location {
            self.state.floor.mark_dirty();
        }
        self.refresh_physics_volume();

        let batch = self
            .config
            .enable_scoped_movement_updates
            .then(|| self.state.body.begin_batch());

        let result = self.perform_movement_stages(delta_time);

        if let Some(batch) = batch {
            self.state.body.commit(batch);
        }
        result?;

        self.save_base_location();
        self.state.root_motion_velocity = None;
        self.state.flags.set(MovementFlags::HAS_REQUESTED_VELOCITY, false);
        self.state.flags.set(MovementFlags::REQUESTED_MOVE_WITH_MAX_SPEED, false);
        self.state.last_update_location = self.location();

        Ok(self.report())
    }

    fn perform_movement_stages(&mut self, delta_time: f32) -> Result<(), LocomotionError> {
        self.update_based_movement(delta_time);

        self.apply_accumulated_forces(delta_time);
        self.handle_pending_launch();
        self.clear_accumulated_forces();

        if let Some(root_motion) = self.state.root_motion_velocity {
            let velocity = self.root_motion_velocity(root_motion);
            self.state.velocity = velocity;
            self.state.root_motion_velocity = Some(velocity);
        }

        ensure_finite(self.state.velocity, "tick start")?;
        self.start_new_physics(delta_time, 0)
    }

    /// Fold pending impulses and forces into the velocity.
    ///
    /// On the ground, a push along the up axis strong enough to beat gravity
    /// for this tick starts a fall.
    pub fn apply_accumulated_forces(&mut self, delta_time: f32) {
        let impulse = self.state.pending_impulse;
        let force = self.state.pending_force;
        if impulse == Vec3::ZERO && force == Vec3::ZERO {
            return;
        }

        if self.is_moving_on_ground() {
            let up = self.up();
            let up_speed = (impulse + force * delta_time + self.gravity_vector() * delta_time).dot(up);
            if up_speed > SMALL_NUMBER {
                log::debug!("pushed off the ground ({up_speed:.1} cm/s up)");
                self.set_movement_mode(MovementMode::Falling);
            }
        }

        self.state.velocity += impulse + force * delta_time;
        self.state.pending_impulse = Vec3::ZERO;
        self.state.pending_force = Vec3::ZERO;
    }

    /// Apply a pending launch. Returns whether there was one.
    pub fn handle_pending_launch(&mut self) -> bool {
        let Some(velocity) = self.state.pending_launch.take() else {
            return false;
        };
        self.state.velocity = velocity;
        self.set_movement_mode(MovementMode::Falling);
        true
    }

    /// Root-motion velocity as applied this tick. While falling the speed
    /// along gravity comes from the simulation, not the animation.
    pub fn root_motion_velocity(&self, root_motion: Vec3) -> Vec3 {
        if !self.is_falling() {
            return root_motion;
        }
        let down = self.gravity_direction(true);
        project_onto_plane(root_motion, down) + down * self.state.velocity.dot(down)
    }
}
