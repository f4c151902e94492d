//! Character locomotion under arbitrary gravity.
//!
//! This module implements capsule character movement with:
//!
//! - Walking on floors, ramps and stairs, in any gravity direction
//! - Falling with air control, landing and ledge handling
//! - Flying, swimming and navigation-mesh walking
//! - Moving platforms (movement bases)
//! - Pluggable floor, velocity, step and slide components
//!
//! # Design
//!
//! Movement is driven by the [`LocomotionStateMachine`], which owns a
//! character's [`MovementState`] and runs one strategy per
//! [`MovementMode`] through a [`MoveContext`].
//!
//! The components ([`FloorScanner`], [`VelocitySolver`], [`StepClimber`],
//! [`SlideResolver`]) and the mode strategies ([`MovementPhysics`]) are trait
//! objects, so a host can replace any of them without touching the rest.
//!
//! All movement is deterministic: the same world, inputs and seed always
//! produce the same outputs.

mod base;
mod body;
mod config;
mod context;
mod controller;
mod floor;
mod gravity;
mod modes;
mod observer;
mod random;
mod slide;
mod state;
mod step;
mod velocity;

pub use body::{CapsuleBody, CapsuleTransform, TransformBatch};
pub use config::LocomotionConfig;
pub use context::{time_step, Components, MoveContext, SimulationStep, TickReport};
pub use controller::LocomotionStateMachine;
pub use floor::{valid_perch_radius, FloorCache, FloorResult, FloorScanner, SweepFloorScanner};
pub use gravity::GravityModel;
pub use modes::{
    FallingPhysics, FlyingPhysics, ModeTable, MovementPhysics, NavWalkingPhysics, SwimmingPhysics,
    WalkingPhysics,
};
pub use observer::{EventLog, MovementControl, MovementEvent, MovementObserver, NullObserver};
pub use random::SeededRandom;
pub use slide::{PlanarSlideResolver, SlideResolver};
pub use state::{MovementBaseState, MovementFlags, MovementMode, MovementState};
pub use step::{StepClimber, StepDownResult, SweepStepClimber};
pub use velocity::{is_exceeding_max_speed, BrakingVelocitySolver, VelocitySolver};
