//! Collision queries for capsule locomotion.
//!
//! This module defines what the locomotion core asks of the world and ships a
//! parry3d-backed implementation of it.
//!
//! # Key Types
//!
//! - [`CollisionQuery`]: capsule sweeps and line traces
//! - [`MovementBaseTracker`]: transforms and velocities of platforms
//! - [`CollisionWorld`]: the bundled world implementing both
//! - [`HitResult`]: output from a sweep or trace
//!
//! # Sweep Results
//!
//! Sweeps move a capsule through the world and return:
//! - How far the capsule traveled (time 0.0-1.0)
//! - The capsule location at the impact
//! - Shape normal and face normal at the impact
//! - Whether the capsule started out overlapping something

mod flags;
mod hit;
mod query;
mod world;

pub use flags::{ContentFlags, SurfaceFlags, SurfaceProperties, WalkableOverride};
pub use hit::{BodyId, HitResult};
pub use query::{
    BaseTransform, CapsuleShape, CollisionQuery, MovementBaseTracker, MovementWorld, QueryFilter,
};
pub use world::{CollisionBody, CollisionWorld};
