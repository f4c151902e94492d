//! Movement modes, flags and the per-character simulation state.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::body::CapsuleBody;
use super::floor::FloorCache;
use super::gravity::GravityModel;
use super::random::SeededRandom;
use crate::collision::{BaseTransform, BodyId, CapsuleShape};

/// Physics mode of a character. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementMode {
    /// No simulation.
    #[default]
    None,
    /// Walking on a walkable floor.
    Walking,
    /// Walking on navigation data without floor sweeps.
    NavWalking,
    /// In the air, under gravity.
    Falling,
    /// Free movement ignoring gravity.
    Flying,
    /// Moving through a fluid volume.
    Swimming,
    /// Host-defined movement; the payload selects the sub-mode.
    Custom(u8),
}

impl MovementMode {
    /// Walking or nav-walking.
    #[inline]
    pub fn is_moving_on_ground(self) -> bool {
        matches!(self, Self::Walking | Self::NavWalking)
    }

    /// Short name for logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Walking => "walking",
            Self::NavWalking => "nav-walking",
            Self::Falling => "falling",
            Self::Flying => "flying",
            Self::Swimming => "swimming",
            Self::Custom(_) => "custom",
        }
    }
}

/// Flags describing transient movement state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementFlags(pub u16);

impl MovementFlags {
    /// The capsule was placed without sweeping this tick. Velocity is not
    /// rederived from displacement.
    pub const JUST_TELEPORTED: u16 = 1 << 0;

    /// Notify the observer when the up-axis velocity stops being positive.
    pub const NOTIFY_APEX: u16 = 1 << 1;

    /// A requested (path-following) velocity is active.
    pub const HAS_REQUESTED_VELOCITY: u16 = 1 << 2;

    /// The requested velocity wants to move at max speed.
    pub const REQUESTED_MOVE_WITH_MAX_SPEED: u16 = 1 << 3;

    /// The capsule centre is inside a water volume.
    pub const IN_WATER: u16 = 1 << 4;

    /// Leaving a base that should not be stood on (another character).
    pub const PERFORMING_JUMP_OFF: u16 = 1 << 5;

    /// Check if a flag is set.
    #[inline]
    pub fn has(self, flag: u16) -> bool {
        (self.0 & flag) != 0
    }

    /// Set or clear a flag.
    #[inline]
    pub fn set(&mut self, flag: u16, value: bool) {
        if value {
            self.0 |= flag;
        } else {
            self.0 &= !flag;
        }
    }

    #[inline]
    pub fn just_teleported(self) -> bool {
        self.has(Self::JUST_TELEPORTED)
    }

    #[inline]
    pub fn in_water(self) -> bool {
        self.has(Self::IN_WATER)
    }
}

/// The platform a character stands on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementBaseState {
    /// Body the character is based on, if any.
    pub base: Option<BodyId>,

    /// Base transform when the character last followed it.
    pub last_transform: Option<BaseTransform>,
}

impl MovementBaseState {
    pub fn clear(&mut self) {
        self.base = None;
        self.last_transform = None;
    }
}

/// Everything one simulated character carries between ticks.
///
/// Owned by [`LocomotionStateMachine`](super::LocomotionStateMachine). The
/// fields are public so that mode strategies and custom components can work
/// on them directly through a [`MoveContext`](super::MoveContext).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementState {
    /// The capsule and its transform batches.
    pub body: CapsuleBody,

    /// Gravity acting on this character.
    pub gravity: GravityModel,

    pub mode: MovementMode,

    /// Mode before the most recent transition.
    pub previous_mode: MovementMode,

    /// Velocity in world space (cm/s).
    pub velocity: Vec3,

    /// Input acceleration in world space (cm/s²).
    pub acceleration: Vec3,

    /// Input magnitude relative to max acceleration, in `[0, 1]`.
    pub analog_input_modifier: f32,

    /// Velocity requested by a path follower.
    pub requested_velocity: Vec3,

    /// Velocity supplied by root motion, replacing integrated velocity.
    pub root_motion_velocity: Option<Vec3>,

    /// Velocity change applied at the start of the next tick.
    pub pending_impulse: Vec3,

    /// Acceleration applied for the next tick only.
    pub pending_force: Vec3,

    /// Launch velocity applied at the start of the next tick.
    pub pending_launch: Option<Vec3>,

    /// Most recent floor query and its freshness.
    pub floor: FloorCache,

    pub base: MovementBaseState,

    pub flags: MovementFlags,

    /// Capsule location when the last tick started.
    pub last_update_location: Vec3,

    /// Deterministic source for jump-off directions.
    pub rng: SeededRandom,
}

impl MovementState {
    /// Create a state for a capsule at `location`.
    pub fn new(capsule: CapsuleShape, location: Vec3, gravity: GravityModel, seed: u32) -> Self {
        let rotation = gravity
            .aligned_rotation(Quat::IDENTITY)
            .unwrap_or(Quat::IDENTITY);
        Self {
            body: CapsuleBody::new(capsule, location, rotation),
            gravity,
            mode: MovementMode::None,
            previous_mode: MovementMode::None,
            velocity: Vec3::ZERO,
            acceleration: Vec3::ZERO,
            analog_input_modifier: 0.0,
            requested_velocity: Vec3::ZERO,
            root_motion_velocity: None,
            pending_impulse: Vec3::ZERO,
            pending_force: Vec3::ZERO,
            pending_launch: None,
            floor: FloorCache::default(),
            base: MovementBaseState::default(),
            flags: MovementFlags::default(),
            last_update_location: location,
            rng: SeededRandom::new(seed),
        }
    }

    /// Whether the state can be simulated: a usable capsule at a finite
    /// transform.
    pub fn has_valid_data(&self) -> bool {
        let transform = self.body.transform();
        self.body.capsule.is_valid() && transform.location.is_finite() && transform.rotation.is_finite()
    }

    /// Whether a requested velocity is active.
    #[inline]
    pub fn has_requested_velocity(&self) -> bool {
        self.flags.has(MovementFlags::HAS_REQUESTED_VELOCITY)
    }

    /// Whether root motion drives velocity this tick.
    #[inline]
    pub fn has_root_motion(&self) -> bool {
        self.root_motion_velocity.is_some()
    }
}
