//! Character entity.
//!
//! A character pairs a [`LocomotionStateMachine`] with a heading and the
//! movement events it has produced since they were last drained.

use glam::{Quat, Vec3};
use gravwalk_physics::{CapsuleShape, EventLog, LocomotionConfig, LocomotionStateMachine, MovementEvent, MovementMode};

use crate::error::GameError;
use crate::input::CharacterInput;

/// Unique identifier for entities.
pub type EntityId = u32;

/// A character in the game.
#[derive(Debug)]
pub struct Character {
    /// Unique character ID.
    pub id: EntityId,

    /// Character name/handle.
    pub name: String,

    /// Locomotion for this character.
    pub machine: LocomotionStateMachine,

    /// Heading about the capsule's up axis (radians).
    pub facing: f32,

    /// Movement events not yet drained.
    pub events: EventLog,
}

impl Character {
    /// Create a character. It is not placed in a level until spawned.
    pub fn new(
        id: EntityId,
        name: impl Into<String>,
        locomotion: &LocomotionConfig,
        capsule: CapsuleShape,
    ) -> Result<Self, GameError> {
        let machine = LocomotionStateMachine::new(locomotion.clone(), capsule)?;
        Ok(Self {
            id,
            name: name.into(),
            machine,
            facing: 0.0,
            events: EventLog::new(),
        })
    }

    /// Get the character's current location (capsule centre).
    #[inline]
    pub fn location(&self) -> Vec3 {
        self.machine.location()
    }

    /// Get the character's current velocity.
    #[inline]
    pub fn velocity(&self) -> Vec3 {
        self.machine.velocity()
    }

    /// Current movement mode.
    #[inline]
    pub fn mode(&self) -> MovementMode {
        self.machine.mode()
    }

    /// Check if the character is standing on something.
    #[inline]
    pub fn is_on_ground(&self) -> bool {
        self.machine.is_moving_on_ground()
    }

    /// Facing direction, perpendicular to the capsule's up axis.
    pub fn forward(&self) -> Vec3 {
        let rotation = self.machine.transform().rotation * Quat::from_rotation_z(self.facing);
        rotation * Vec3::X
    }

    /// Right-hand direction, perpendicular to forward and up.
    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.machine.up())
    }

    /// Turn, steer and jump from one tick of input.
    ///
    /// Mode switches that need the world (flying) are handled by the
    /// simulation.
    pub fn apply_input(&mut self, input: &CharacterInput) {
        self.facing = (self.facing + input.turn).rem_euclid(std::f32::consts::TAU);

        let acceleration = input.to_acceleration(self.forward(), self.right(), self.machine.up());
        self.machine.set_input_acceleration(acceleration);

        if input.actions.jump && self.machine.jump() {
            log::debug!("{} jumped", self.name);
        }
    }

    /// Remove and return the events recorded since the last drain.
    pub fn drain_events(&mut self) -> Vec<MovementEvent> {
        self.events.drain()
    }
}
