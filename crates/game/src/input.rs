//! Character input handling.
//!
//! This module converts key states into an input direction for the
//! locomotion state machine, expressed in the character's own frame.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Input for a single character for a single tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterInput {
    /// Movement keys pressed.
    pub movement: MovementInput,

    /// Turn about the character's up axis this tick (radians).
    pub turn: f32,

    /// Action buttons pressed.
    pub actions: ActionInput,

    /// Frame number this input was generated.
    pub frame: u32,
}

/// Movement key states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementInput {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    /// Only has an effect while flying or swimming.
    pub ascend: bool,
    pub descend: bool,
}

/// Action button states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionInput {
    pub jump: bool,
    /// Held to fly; released to return to the default mode.
    pub fly: bool,
}

impl CharacterInput {
    /// Movement as (forward, right, up) axes, each in [-1, 1].
    ///
    /// Diagonals are normalized so they are no faster than straight moves.
    pub fn move_axes(&self) -> Vec3 {
        fn axis(positive: bool, negative: bool) -> f32 {
            (positive as i32 - negative as i32) as f32
        }

        let axes = Vec3::new(
            axis(self.movement.forward, self.movement.backward),
            axis(self.movement.right, self.movement.left),
            axis(self.movement.ascend, self.movement.descend),
        );
        if axes.length_squared() > 1.0 {
            axes.normalize()
        } else {
            axes
        }
    }

    /// Input direction in world space given the character's basis.
    pub fn to_acceleration(&self, forward: Vec3, right: Vec3, up: Vec3) -> Vec3 {
        let axes = self.move_axes();
        forward * axes.x + right * axes.y + up * axes.z
    }

    /// Check if any movement input is active.
    pub fn has_movement(&self) -> bool {
        self.move_axes() != Vec3::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagonal_is_normalized() {
        let mut input = CharacterInput::default();
        input.movement.forward = true;
        input.movement.right = true;

        let axes = input.move_axes();
        assert!((axes.length() - 1.0).abs() < 1e-6);
        assert!(axes.x > 0.0 && axes.x < 1.0);
        assert!(axes.y > 0.0 && axes.y < 1.0);
    }

    #[test]
    fn test_straight_movement_not_normalized() {
        let mut input = CharacterInput::default();
        input.movement.forward = true;

        assert_eq!(input.move_axes(), Vec3::X);
        assert!(input.has_movement());
    }

    #[test]
    fn test_opposite_keys_cancel() {
        let mut input = CharacterInput::default();
        input.movement.left = true;
        input.movement.right = true;
        assert!(!input.has_movement());
    }

    #[test]
    fn test_acceleration_uses_character_basis() {
        let mut input = CharacterInput::default();
        input.movement.forward = true;

        // A character standing on a wall, facing up the wall.
        let acceleration = input.to_acceleration(Vec3::Z, Vec3::Y, Vec3::X);
        assert_eq!(acceleration, Vec3::Z);
    }
}
