//! The per-tick view of one character.
//!
//! A [`MoveContext`] borrows everything a movement step needs: the
//! configuration, the world, the pluggable components and the character's
//! mutable state. Components and mode strategies receive the context instead
//! of holding references of their own, so a custom [`FloorScanner`] or mode
//! can call back into every other part of the pipeline.
//!
//! Mode-specific helpers live next to the mode that owns them (for example
//! `start_falling` in `modes/falling.rs`); this file holds what every mode
//! shares.

use glam::{Quat, Vec3};

use super::config::LocomotionConfig;
use super::floor::{FloorResult, FloorScanner, SweepFloorScanner};
use super::modes::ModeTable;
use super::observer::{MovementControl, MovementObserver};
use super::slide::{PlanarSlideResolver, SlideResolver};
use super::state::{MovementFlags, MovementMode, MovementState};
use super::step::{StepClimber, StepDownResult, SweepStepClimber};
use super::velocity::{BrakingVelocitySolver, VelocitySolver};
use crate::collision::{
    BodyId, CapsuleShape, ContentFlags, HitResult, MovementWorld, QueryFilter,
};
use crate::error::LocomotionError;
use crate::math::{clamp_to_max_size, project_onto_plane, MIN_TICK_TIME};

/// Distance added to the penetration depth when pushing out of geometry.
const PENETRATION_PULLBACK: f32 = 0.125;

/// Inflation of the overlap test that validates a push-out.
const PENETRATION_OVERLAP_INFLATION: f32 = 0.1;

// ============================================================================
// Components
// ============================================================================

/// The pluggable parts of the locomotion pipeline.
pub struct Components {
    pub floor: Box<dyn FloorScanner>,
    pub velocity: Box<dyn VelocitySolver>,
    pub step: Box<dyn StepClimber>,
    pub slide: Box<dyn SlideResolver>,
    /// One strategy per movement mode.
    pub modes: ModeTable,
}

impl Default for Components {
    fn default() -> Self {
        Self {
            floor: Box::new(SweepFloorScanner),
            velocity: Box::new(BrakingVelocitySolver),
            step: Box::new(SweepStepClimber),
            slide: Box::new(PlanarSlideResolver),
            modes: ModeTable::default(),
        }
    }
}

impl std::fmt::Debug for Components {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Components")
            .field("custom_modes", &self.modes.custom_modes())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Sub-stepping
// ============================================================================

/// Length of the next sub-step given the time left in the tick.
///
/// Long remainders are halved while iterations remain so the last sub-steps
/// are not tiny; the final allowed iteration takes whatever is left.
pub fn time_step(remaining_time: f32, iterations: u32, config: &LocomotionConfig) -> f32 {
    let mut step = remaining_time;
    if remaining_time > config.max_simulation_time_step
        && iterations < config.max_simulation_iterations
    {
        step = config
            .max_simulation_time_step
            .min(remaining_time * 0.5);
    }
    step.max(MIN_TICK_TIME)
}

/// Time left in a tick and the sub-steps spent so far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationStep {
    pub remaining_time: f32,
    pub iterations: u32,
}

impl SimulationStep {
    pub fn new(delta_time: f32, iterations: u32) -> Self {
        Self {
            remaining_time: delta_time,
            iterations,
        }
    }

    /// Whether another sub-step may run.
    #[inline]
    pub fn has_time(&self, config: &LocomotionConfig) -> bool {
        self.remaining_time >= MIN_TICK_TIME && self.iterations < config.max_simulation_iterations
    }

    /// Start the next sub-step and return its length.
    pub fn advance(&mut self, config: &LocomotionConfig) -> f32 {
        self.iterations += 1;
        let step = time_step(self.remaining_time, self.iterations, config);
        self.remaining_time -= step;
        step
    }

    /// Time is left over but the iteration budget is spent.
    #[inline]
    pub fn is_exhausted(&self, config: &LocomotionConfig) -> bool {
        self.remaining_time >= MIN_TICK_TIME && self.iterations >= config.max_simulation_iterations
    }
}

/// What one call to `perform_movement_tick` did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    /// Most sub-steps any mode used.
    pub iterations_used: u32,
    /// The tick ended with time left because the iteration cap was reached.
    pub hit_iteration_cap: bool,
    pub mode_before: MovementMode,
    pub mode_after: MovementMode,
}

// ============================================================================
// MoveContext
// ============================================================================

/// Mutable access to one character for the duration of a tick.
pub struct MoveContext<'a> {
    pub config: &'a LocomotionConfig,
    pub world: &'a dyn MovementWorld,
    pub components: &'a Components,
    pub state: &'a mut MovementState,
    pub observer: &'a mut dyn MovementObserver,
    pub(crate) report: TickReport,
}

impl<'a> MoveContext<'a> {
    pub fn new(
        config: &'a LocomotionConfig,
        world: &'a dyn MovementWorld,
        components: &'a Components,
        state: &'a mut MovementState,
        observer: &'a mut dyn MovementObserver,
    ) -> Self {
        let mode = state.mode;
        Self {
            config,
            world,
            components,
            state,
            observer,
            report: TickReport {
                mode_before: mode,
                mode_after: mode,
                ..TickReport::default()
            },
        }
    }

    /// The report so far, with the current mode filled in.
    pub fn report(&self) -> TickReport {
        TickReport {
            mode_after: self.state.mode,
            ..self.report
        }
    }

    /// Fold a finished sub-step loop into the tick report.
    pub fn record_step(&mut self, step: &SimulationStep) {
        self.report.iterations_used = self.report.iterations_used.max(step.iterations);
        if step.is_exhausted(self.config) {
            self.report.hit_iteration_cap = true;
            log::debug!(
                "{} gave up with {:.4}s left after {} iterations",
                self.state.mode.name(),
                step.remaining_time,
                step.iterations
            );
        }
    }
}

impl MoveContext<'_> {
    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn location(&self) -> Vec3 {
        self.state.body.location()
    }

    #[inline]
    pub fn rotation(&self) -> Quat {
        self.state.body.rotation()
    }

    /// Capsule up axis.
    #[inline]
    pub fn up(&self) -> Vec3 {
        self.state.body.up()
    }

    #[inline]
    pub fn capsule(&self) -> CapsuleShape {
        self.state.body.capsule
    }

    #[inline]
    pub fn filter(&self) -> QueryFilter {
        self.state.body.filter()
    }

    #[inline]
    pub fn is_moving_on_ground(&self) -> bool {
        self.state.mode.is_moving_on_ground()
    }

    #[inline]
    pub fn is_falling(&self) -> bool {
        self.state.mode == MovementMode::Falling
    }

    #[inline]
    pub fn has_valid_data(&self) -> bool {
        self.state.has_valid_data()
    }

    /// Unit "down", or zero without gravity unless `avoid_zero` is set.
    #[inline]
    pub fn gravity_direction(&self, avoid_zero: bool) -> Vec3 {
        self.state.gravity.gravity_direction(avoid_zero)
    }

    #[inline]
    pub fn gravity_vector(&self) -> Vec3 {
        self.state.gravity.gravity_vector()
    }

    /// Speed limit of the current mode.
    pub fn max_speed(&self) -> f32 {
        match self.state.mode {
            MovementMode::Walking | MovementMode::NavWalking | MovementMode::Falling => {
                self.config.max_walk_speed
            }
            MovementMode::Flying => self.config.max_fly_speed,
            MovementMode::Swimming => self.config.max_swim_speed,
            MovementMode::Custom(_) => self.config.max_custom_speed,
            MovementMode::None => 0.0,
        }
    }

    /// Floor on the speed cap from partial analog input.
    pub fn min_analog_speed(&self) -> f32 {
        match self.state.mode {
            MovementMode::Walking | MovementMode::NavWalking | MovementMode::Falling => {
                self.config.min_analog_walk_speed
            }
            _ => 0.0,
        }
    }

    /// Braking deceleration of the current mode.
    pub fn max_braking_deceleration(&self) -> f32 {
        match self.state.mode {
            MovementMode::Walking | MovementMode::NavWalking => self.config.braking_deceleration_walking,
            MovementMode::Falling => self.config.braking_deceleration_falling,
            MovementMode::Flying => self.config.braking_deceleration_flying,
            MovementMode::Swimming => self.config.braking_deceleration_swimming,
            MovementMode::Custom(_) | MovementMode::None => 0.0,
        }
    }

    // ========================================================================
    // Moving the capsule
    // ========================================================================

    /// Move the capsule, stopping at the first blocking hit when sweeping.
    pub fn move_component(&mut self, delta: Vec3, rotation: Quat, sweep: bool) -> HitResult {
        let world = self.world;
        self.state.body.move_by(world, delta, rotation, sweep)
    }

    /// Move the capsule, pushing out of geometry and retrying once if the
    /// move started penetrating.
    pub fn safe_move(&mut self, delta: Vec3, rotation: Quat, sweep: bool) -> HitResult {
        let mut hit = self.move_component(delta, rotation, sweep);
        if hit.start_penetrating {
            let adjustment = self.penetration_adjustment(&hit);
            if self.resolve_penetration(adjustment, &hit, rotation) {
                hit = self.move_component(delta, rotation, sweep);
            }
        }
        hit
    }

    /// Push-out that clears the penetration reported by `hit`.
    pub fn penetration_adjustment(&self, hit: &HitResult) -> Vec3 {
        if !hit.start_penetrating {
            return Vec3::ZERO;
        }
        let depth = if hit.penetration_depth > 0.0 {
            hit.penetration_depth
        } else {
            PENETRATION_PULLBACK
        };
        let adjustment = hit.normal * (depth + PENETRATION_PULLBACK);
        clamp_to_max_size(adjustment, self.config.max_depenetration)
    }

    /// Try to move out of the penetration described by `hit`.
    ///
    /// Returns whether the capsule moved. A successful push-out counts as a
    /// teleport for the rest of the tick.
    pub fn resolve_penetration(&mut self, adjustment: Vec3, hit: &HitResult, rotation: Quat) -> bool {
        if adjustment == Vec3::ZERO || !self.state.body.collision_enabled {
            return false;
        }

        let target = hit.trace_start + adjustment;
        let mut moved = false;

        if self.is_free_at(target, rotation) {
            let delta = target - self.location();
            self.move_component(delta, rotation, false);
            moved = true;
            log::debug!("pushed out of penetration by {adjustment}");
        } else {
            let before = self.location();
            let sweep = self.move_component(adjustment, rotation, true);
            moved = self.location() != before;

            if !moved && sweep.start_penetrating {
                let second = self.penetration_adjustment(&sweep);
                let combined = adjustment + second;
                if second != adjustment && combined != Vec3::ZERO {
                    let target = hit.trace_start + combined;
                    if self.is_free_at(target, rotation) {
                        let delta = target - self.location();
                        self.move_component(delta, rotation, false);
                        moved = true;
                        log::debug!("pushed out of two overlaps by {combined}");
                    }
                }
            }

            if !moved {
                let requested = hit.trace_end - hit.trace_start;
                if requested != Vec3::ZERO {
                    let before = self.location();
                    self.move_component(adjustment + requested, rotation, true);
                    moved = self.location() != before;
                }
            }

            if !moved {
                log::trace!("failed to resolve penetration at {}", self.location());
            }
        }

        if moved {
            self.state.flags.set(MovementFlags::JUST_TELEPORTED, true);
        }
        moved
    }

    /// Whether a slightly inflated capsule fits at `location`.
    fn is_free_at(&self, location: Vec3, rotation: Quat) -> bool {
        let capsule = self.capsule();
        let inflated = CapsuleShape::new(
            capsule.radius + PENETRATION_OVERLAP_INFLATION,
            capsule.half_height + PENETRATION_OVERLAP_INFLATION,
        );
        !self
            .world
            .sweep_capsule(location, location, rotation, inflated, self.filter())
            .blocking_hit
    }

    /// Rotate the capsule so its up axis opposes gravity.
    pub fn update_component_rotation(&mut self) {
        if let Some(rotation) = self.state.gravity.aligned_rotation(self.rotation()) {
            let location = self.location();
            self.state.body.set_transform(location, rotation);
        }
    }

    // ========================================================================
    // Components
    // ========================================================================

    pub fn find_floor(&mut self, location: Vec3, zero_delta: bool, downward_sweep: Option<&HitResult>) -> FloorResult {
        let components = self.components;
        components.floor.find_floor(self, location, zero_delta, downward_sweep)
    }

    pub fn compute_floor_dist(
        &self,
        location: Vec3,
        line_distance: f32,
        sweep_distance: f32,
        sweep_radius: f32,
        downward_sweep: Option<&HitResult>,
    ) -> FloorResult {
        self.components
            .floor
            .compute_floor_dist(self, location, line_distance, sweep_distance, sweep_radius, downward_sweep)
    }

    pub fn is_walkable(&self, hit: &HitResult) -> bool {
        self.components.floor.is_walkable(self, hit)
    }

    pub fn is_within_edge_tolerance(&self, capsule_location: Vec3, impact_point: Vec3, capsule_radius: f32) -> bool {
        self.components
            .floor
            .is_within_edge_tolerance(self, capsule_location, impact_point, capsule_radius)
    }

    pub fn should_compute_perch_result(&self, hit: &HitResult, check_radius: bool) -> bool {
        self.components.floor.should_compute_perch_result(self, hit, check_radius)
    }

    pub fn compute_perch_result(&self, test_radius: f32, hit: &HitResult, max_floor_dist: f32) -> Option<FloorResult> {
        self.components
            .floor
            .compute_perch_result(self, test_radius, hit, max_floor_dist)
    }

    pub fn calc_velocity(&mut self, delta_time: f32, friction: f32, fluid: bool, braking_deceleration: f32) {
        let components = self.components;
        components
            .velocity
            .calc_velocity(self, delta_time, friction, fluid, braking_deceleration);
    }

    pub fn can_step_up(&self, hit: &HitResult) -> bool {
        self.components.step.can_step_up(self, hit)
    }

    pub fn step_up(
        &mut self,
        gravity_direction: Vec3,
        delta: Vec3,
        hit: &HitResult,
        step_down: Option<&mut StepDownResult>,
    ) -> bool {
        let components = self.components;
        components.step.step_up(self, gravity_direction, delta, hit, step_down)
    }

    pub fn slide_along_surface(
        &mut self,
        delta: Vec3,
        time: f32,
        normal: Vec3,
        hit: &mut HitResult,
        handle_impact: bool,
    ) -> f32 {
        let components = self.components;
        components
            .slide
            .slide_along_surface(self, delta, time, normal, hit, handle_impact)
    }

    pub fn compute_slide_vector(&self, delta: Vec3, time: f32, normal: Vec3, hit: &HitResult) -> Vec3 {
        self.components.slide.compute_slide_vector(self, delta, time, normal, hit)
    }

    pub fn two_wall_adjust(&self, delta: Vec3, hit: &HitResult, old_hit_normal: Vec3) -> Vec3 {
        self.components.slide.two_wall_adjust(self, delta, hit, old_hit_normal)
    }

    /// Tell the observer a move ran into `hit`.
    pub fn handle_impact(&mut self, hit: &HitResult) {
        log::trace!("impact at {} normal {}", hit.impact_point, hit.impact_normal);
        self.observer.on_move_blocked(hit);
    }

    // ========================================================================
    // Movement modes
    // ========================================================================

    /// Switch modes. Setting the current mode again does nothing.
    pub fn set_movement_mode(&mut self, mode: MovementMode) {
        if mode == self.state.mode {
            return;
        }
        let previous = self.state.mode;
        let earlier = self.state.previous_mode;
        self.state.previous_mode = previous;
        self.state.mode = mode;

        if self.has_valid_data() {
            self.on_movement_mode_changed(previous, earlier);
        }
    }

    /// Swimming in water, walking on a floor, falling otherwise.
    pub fn set_default_movement_mode(&mut self) {
        self.refresh_physics_volume();
        if self.state.flags.in_water() && self.config.can_ever_swim {
            self.set_movement_mode(MovementMode::Swimming);
            return;
        }
        self.set_movement_mode(MovementMode::Walking);
        if self.state.mode == MovementMode::Walking && self.state.base.base.is_none() {
            self.set_movement_mode(MovementMode::Falling);
        }
    }

    /// `earlier` is the mode that preceded `previous`.
    fn on_movement_mode_changed(&mut self, previous: MovementMode, earlier: MovementMode) {
        let mode = self.state.mode;
        log::debug!("movement mode {} -> {}", previous.name(), mode.name());

        if mode == MovementMode::NavWalking {
            self.state.velocity = project_onto_plane(self.state.velocity, self.up());
        } else if previous == MovementMode::NavWalking && mode == MovementMode::Walking && !self.try_to_leave_nav_walking() {
            self.set_movement_mode(MovementMode::NavWalking);
            // The refused switch never happened.
            self.state.previous_mode = earlier;
            return;
        }

        if mode == MovementMode::Walking {
            self.state.velocity = project_onto_plane(self.state.velocity, self.up());
            self.update_component_rotation();
            let location = self.location();
            let floor = self.find_floor(location, false, None);
            self.state.floor.store(floor);
            self.adjust_floor_height();
            self.set_base_from_floor();
        } else {
            self.state.floor.clear();
            self.update_component_rotation();
            if mode == MovementMode::Falling {
                self.state.velocity += self.imparted_base_velocity();
                self.notify_falling();
            }
            self.set_base(None);
            if mode == MovementMode::None {
                self.state.velocity = Vec3::ZERO;
                self.clear_accumulated_forces();
            }
        }

        let mut control = MovementControl::default();
        self.observer.on_movement_mode_changed(previous, mode, &mut control);
        self.apply_control(control);
    }

    /// Leaving nav-walking needs a spot free of overlaps.
    fn try_to_leave_nav_walking(&mut self) -> bool {
        if !self.state.body.collision_enabled {
            return true;
        }
        let location = self.location();
        let overlap = self
            .world
            .sweep_capsule(location, location, self.rotation(), self.capsule(), self.filter());
        if overlap.blocking_hit {
            log::debug!("cannot leave nav-walking: capsule overlaps body {:?}", overlap.body);
            return false;
        }
        true
    }

    pub fn clear_accumulated_forces(&mut self) {
        self.state.pending_impulse = Vec3::ZERO;
        self.state.pending_force = Vec3::ZERO;
        self.state.pending_launch = None;
    }

    /// Run the current mode for `delta_time`.
    ///
    /// `iterations` counts sub-steps already spent this tick.
    pub fn start_new_physics(&mut self, delta_time: f32, iterations: u32) -> Result<(), LocomotionError> {
        if delta_time < MIN_TICK_TIME || !self.has_valid_data() {
            return Ok(());
        }
        if iterations >= self.config.max_simulation_iterations {
            self.report.hit_iteration_cap = true;
            log::debug!(
                "no iterations left for {} with {:.4}s remaining",
                self.state.mode.name(),
                delta_time
            );
            return Ok(());
        }

        let components = self.components;
        match self.state.mode {
            MovementMode::None => Ok(()),
            MovementMode::Walking => components.modes.walking.simulate(self, delta_time, iterations),
            MovementMode::NavWalking => components.modes.nav_walking.simulate(self, delta_time, iterations),
            MovementMode::Falling => components.modes.falling.simulate(self, delta_time, iterations),
            MovementMode::Flying => components.modes.flying.simulate(self, delta_time, iterations),
            MovementMode::Swimming => components.modes.swimming.simulate(self, delta_time, iterations),
            MovementMode::Custom(sub_mode) => match components.modes.custom(sub_mode) {
                Some(physics) => physics.simulate(self, delta_time, iterations),
                None => {
                    log::warn!("no strategy registered for custom mode {sub_mode}");
                    self.set_movement_mode(MovementMode::None);
                    Ok(())
                }
            },
        }
    }

    // ========================================================================
    // Observer
    // ========================================================================

    pub fn notify_landed(&mut self, hit: &HitResult) {
        let mut control = MovementControl::default();
        self.observer.on_landed(hit, &mut control);
        self.apply_control(control);
    }

    pub fn notify_falling(&mut self) {
        let mut control = MovementControl::default();
        self.observer.on_falling(&mut control);
        self.apply_control(control);
    }

    pub fn notify_jump_apex(&mut self) {
        self.state.flags.set(MovementFlags::NOTIFY_APEX, false);
        let mut control = MovementControl::default();
        self.observer.on_reached_jump_apex(&mut control);
        self.apply_control(control);
    }

    fn apply_control(&mut self, control: MovementControl) {
        if control.is_empty() {
            return;
        }
        if control.just_teleported {
            self.state.flags.set(MovementFlags::JUST_TELEPORTED, true);
        }
        if let Some(velocity) = control.launch {
            self.state.pending_launch = Some(velocity);
        }
        if let Some(mode) = control.requested_mode {
            self.set_movement_mode(mode);
        }
    }

    // ========================================================================
    // Ground helpers
    // ========================================================================

    /// Drop the velocity component along the capsule up axis.
    pub fn maintain_horizontal_ground_velocity(&mut self) {
        self.state.velocity = project_onto_plane(self.state.velocity, self.up());
    }

    /// Move toward the middle of the floor clearance band when the current
    /// floor lies outside it.
    pub fn adjust_floor_height(&mut self) {
        let floor = *self.state.floor.current();
        if !floor.is_walkable_floor() {
            return;
        }

        let old_floor_dist = if floor.line_trace { floor.line_dist } else { floor.floor_dist };
        // Moving up off a line-trace floor would climb unwalkable walls.
        if floor.line_trace && old_floor_dist < self.config.min_floor_dist {
            return;
        }
        if old_floor_dist >= self.config.min_floor_dist && old_floor_dist <= self.config.max_floor_dist {
            return;
        }

        let up = self.up();
        let initial = self.location().dot(up);
        let average = 0.5 * (self.config.min_floor_dist + self.config.max_floor_dist);
        let move_dist = average - old_floor_dist;
        let rotation = self.rotation();
        let hit = self.safe_move(up * move_dist, rotation, true);
        let moved = self.location().dot(up) - initial;

        if hit.is_valid_blocking_hit() && move_dist < 0.0 && self.is_walkable(&hit) {
            self.state
                .floor
                .store(FloorResult::from_sweep(hit, old_floor_dist + moved, true));
        } else {
            self.state.floor.current_mut().floor_dist = old_floor_dist + moved;
        }
        log::trace!("adjusted floor height by {moved:.3} (floor was {old_floor_dist:.3} away)");

        if !self.config.maintain_horizontal_ground_velocity || old_floor_dist < 0.0 {
            self.state.flags.set(MovementFlags::JUST_TELEPORTED, true);
        }
    }

    /// Stand on `base`, remembering its transform for based movement.
    pub fn set_base(&mut self, base: Option<BodyId>) {
        if self.state.base.base == base {
            return;
        }
        self.state.base.base = base;
        self.state.base.last_transform = base.and_then(|id| self.world.base_transform(id));
        log::trace!("movement base set to {base:?}");
    }

    /// Base on the current floor when it is walkable.
    pub fn set_base_from_floor(&mut self) {
        let floor = *self.state.floor.current();
        if floor.is_walkable_floor() {
            self.set_base(floor.hit.body);
            if !floor.hit.surface.can_be_base() {
                self.jump_off();
            }
        } else {
            self.set_base(None);
        }
    }

    // ========================================================================
    // Physics volumes
    // ========================================================================

    /// Re-check whether the capsule centre is in water and react to a change.
    pub fn refresh_physics_volume(&mut self) {
        let location = self.location();
        let in_water = self
            .world
            .line_trace(location, location, QueryFilter::new(ContentFlags::WATER))
            .blocking_hit;
        if in_water == self.state.flags.in_water() {
            return;
        }
        self.state.flags.set(MovementFlags::IN_WATER, in_water);
        log::debug!("{} water at {location}", if in_water { "entered" } else { "left" });

        if in_water {
            if self.config.can_ever_swim && self.state.mode != MovementMode::None {
                self.set_movement_mode(MovementMode::Swimming);
            }
        } else if self.state.mode == MovementMode::Swimming {
            self.set_movement_mode(MovementMode::Falling);
        }
    }

    /// Fraction of the capsule height below the water surface.
    pub fn immersion_depth(&self) -> f32 {
        if !self.state.flags.in_water() {
            return 0.0;
        }
        let half_height = self.capsule().half_height;
        if half_height == 0.0 || self.config.buoyancy == 0.0 {
            return 1.0;
        }
        let up = self.up();
        let location = self.location();
        let hit = self.world.line_trace(
            location + up * half_height,
            location - up * half_height,
            QueryFilter::new(ContentFlags::WATER),
        );
        if hit.blocking_hit && !hit.start_penetrating {
            1.0 - hit.time
        } else {
            1.0
        }
    }
}

// ============================================================================
// Test support
// ============================================================================

#[cfg(test)]
pub(crate) struct TestRig {
    pub config: LocomotionConfig,
    pub components: Components,
    pub state: MovementState,
    pub world: crate::collision::CollisionWorld,
    pub events: super::observer::EventLog,
}

#[cfg(test)]
impl TestRig {
    /// A default capsule (radius 34, half height 88) at `location`, with
    /// full analog input.
    pub fn new(world: crate::collision::CollisionWorld, location: Vec3) -> Self {
        let mut state = MovementState::new(
            CapsuleShape::new(34.0, 88.0),
            location,
            super::gravity::GravityModel::default(),
            1,
        );
        state.analog_input_modifier = 1.0;
        Self {
            config: LocomotionConfig::default(),
            components: Components::default(),
            state,
            world,
            events: super::observer::EventLog::new(),
        }
    }

    pub fn ctx(&mut self) -> MoveContext<'_> {
        MoveContext::new(
            &self.config,
            &self.world,
            &self.components,
            &mut self.state,
            &mut self.events,
        )
    }
}
