//! Gravwalk Game Logic
//!
//! This crate runs characters through levels on top of the locomotion
//! state machine:
//!
//! - Character input handling
//! - Levels with gravity fields, spawn points and moving platforms
//! - The fixed-step simulation loop and its JSON configuration
//!
//! # Architecture
//!
//! The simulation is deterministic. Every update is driven by per-character
//! inputs and a fixed time step.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Game Simulation                         │
//! │  ┌─────────┐    ┌──────────────┐    ┌─────────────────────┐  │
//! │  │ Input   │───►│ Locomotion   │───►│ Characters          │  │
//! │  │ (keys,  │    │ (modes, floor│    │ (location, mode,    │  │
//! │  │  turn)  │    │  step, slide)│    │  events)            │  │
//! │  └─────────┘    └──────┬───────┘    └─────────────────────┘  │
//! │                        │ queries                              │
//! │                 ┌──────▼───────┐                              │
//! │                 │ Level        │ gravity field, platforms     │
//! │                 └──────────────┘                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod character;
pub mod error;
pub mod input;
pub mod level;
pub mod simulation;

// Re-export main types
pub use character::{Character, EntityId};
pub use error::GameError;
pub use input::CharacterInput;
pub use level::{GravityField, Level, LEVEL_NAMES};
pub use simulation::{Simulation, SimulationConfig};

// Re-export physics types for convenience
pub use gravwalk_physics::{
    CapsuleShape, CollisionWorld, ContentFlags, LocomotionConfig, LocomotionStateMachine, MovementEvent,
    MovementMode,
};
