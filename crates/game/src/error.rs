//! Errors from the game layer.

use gravwalk_physics::{ConfigError, LocomotionError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("invalid locomotion config: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Locomotion(#[from] LocomotionError),

    #[error("failed to parse simulation config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("tick rate must be positive")]
    ZeroTickRate,

    #[error("unknown level '{0}'")]
    UnknownLevel(String),

    #[error("level '{0}' has no spawn points")]
    NoSpawnPoint(String),
}
