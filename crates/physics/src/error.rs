//! Errors surfaced to the host.
//!
//! Geometric trouble (penetration, missing floors, stuck capsules) is never an
//! error: the movement code resolves it locally. These variants cover bad
//! input data and broken numeric invariants.

use glam::Vec3;
use thiserror::Error;

/// Invalid locomotion configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be {requirement}, got {value}")]
    OutOfRange {
        field: &'static str,
        requirement: &'static str,
        value: f32,
    },

    #[error("min_floor_dist ({min}) must not exceed max_floor_dist ({max})")]
    FloorBand { min: f32, max: f32 },

    #[error("max_simulation_iterations must be at least 1")]
    ZeroIterations,
}

/// Failure of a movement tick.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocomotionError {
    /// Velocity became NaN or infinite. Simulation cannot continue.
    #[error("non-finite velocity {velocity} after {stage}")]
    NonFiniteVelocity { stage: &'static str, velocity: Vec3 },

    #[error("invalid capsule: radius {radius}, half height {half_height}")]
    InvalidCapsule { radius: f32, half_height: f32 },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Fail with [`LocomotionError::NonFiniteVelocity`] unless `velocity` is finite.
pub(crate) fn ensure_finite(velocity: Vec3, stage: &'static str) -> Result<(), LocomotionError> {
    if velocity.is_finite() {
        Ok(())
    } else {
        log::error!("non-finite velocity {velocity} after {stage}");
        Err(LocomotionError::NonFiniteVelocity { stage, velocity })
    }
}
