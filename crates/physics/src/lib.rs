//! Gravwalk Physics
//!
//! Capsule character locomotion that works in any gravity direction: walk on
//! walls, around planets and on moving platforms with the same stairs, slopes
//! and ledge handling as on flat ground.
//!
//! # Architecture
//!
//! The crate is split into two main systems:
//!
//! - **Collision**: sweeps capsules and traces rays through the world, returns hit information
//! - **Movement**: uses those queries to run the per-mode locomotion state machine
//!
//! # Design Principles
//!
//! 1. **Determinism**: same inputs always produce same outputs
//! 2. **Gravity independence**: nothing assumes world Z is up
//! 3. **Pluggability**: floor, velocity, step, slide and mode logic sit behind traits
//! 4. **Local recovery**: geometric trouble is resolved in place, never surfaced as an error
//!
//! # Units
//!
//! Centimetres and seconds. Capsule locations are capsule centres.

pub mod collision;
pub mod error;
pub mod math;
pub mod movement;

// Re-export commonly used types
pub use collision::{
    BodyId, CapsuleShape, CollisionQuery, CollisionWorld, ContentFlags, HitResult, MovementBaseTracker,
    MovementWorld, QueryFilter, SurfaceFlags, SurfaceProperties,
};
pub use error::{ConfigError, LocomotionError};
pub use movement::{
    EventLog, GravityModel, LocomotionConfig, LocomotionStateMachine, MovementEvent, MovementMode,
    MovementObserver, MovementState, NullObserver, TickReport,
};
