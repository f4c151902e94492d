//! Per-mode physics strategies.
//!
//! Each [`MovementMode`](super::MovementMode) is simulated by one
//! [`MovementPhysics`] object held in a [`ModeTable`]. Strategies may change
//! the mode mid-tick and hand the remaining time to the new mode through
//! [`MoveContext::start_new_physics`].

mod falling;
mod flying;
mod nav_walking;
mod swimming;
mod walking;

use std::collections::HashMap;

use super::context::MoveContext;
use crate::error::LocomotionError;

pub use falling::FallingPhysics;
pub use flying::FlyingPhysics;
pub use nav_walking::NavWalkingPhysics;
pub use swimming::SwimmingPhysics;
pub use walking::WalkingPhysics;

/// Simulates one movement mode.
pub trait MovementPhysics {
    /// Advance the character by `delta_time`.
    ///
    /// `iterations` counts the sub-steps already spent this tick.
    fn simulate(
        &self,
        ctx: &mut MoveContext<'_>,
        delta_time: f32,
        iterations: u32,
    ) -> Result<(), LocomotionError>;
}

/// The strategy used for each movement mode.
pub struct ModeTable {
    pub walking: Box<dyn MovementPhysics>,
    pub nav_walking: Box<dyn MovementPhysics>,
    pub falling: Box<dyn MovementPhysics>,
    pub flying: Box<dyn MovementPhysics>,
    pub swimming: Box<dyn MovementPhysics>,
    custom: HashMap<u8, Box<dyn MovementPhysics>>,
}

impl Default for ModeTable {
    fn default() -> Self {
        Self {
            walking: Box::new(WalkingPhysics),
            nav_walking: Box::new(NavWalkingPhysics),
            falling: Box::new(FallingPhysics),
            flying: Box::new(FlyingPhysics),
            swimming: Box::new(SwimmingPhysics),
            custom: HashMap::new(),
        }
    }
}

impl ModeTable {
    /// Register the strategy for `MovementMode::Custom(sub_mode)`, returning
    /// the one it replaces.
    pub fn register_custom(
        &mut self,
        sub_mode: u8,
        physics: Box<dyn MovementPhysics>,
    ) -> Option<Box<dyn MovementPhysics>> {
        self.custom.insert(sub_mode, physics)
    }

    /// Strategy for a custom sub-mode, if one is registered.
    pub fn custom(&self, sub_mode: u8) -> Option<&dyn MovementPhysics> {
        self.custom.get(&sub_mode).map(|physics| physics.as_ref())
    }

    /// Registered custom sub-modes, in ascending order.
    pub fn custom_modes(&self) -> Vec<u8> {
        let mut modes: Vec<u8> = self.custom.keys().copied().collect();
        modes.sort_unstable();
        modes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Hover;

    impl MovementPhysics for Hover {
        fn simulate(&self, ctx: &mut MoveContext<'_>, delta_time: f32, _iterations: u32) -> Result<(), LocomotionError> {
            let delta = ctx.state.velocity * delta_time;
            let rotation = ctx.rotation();
            ctx.safe_move(delta, rotation, true);
            Ok(())
        }
    }

    #[test]
    fn test_register_custom() {
        let mut table = ModeTable::default();
        assert!(table.custom(3).is_none());
        assert!(table.register_custom(3, Box::new(Hover)).is_none());
        assert!(table.register_custom(1, Box::new(Hover)).is_none());
        assert!(table.register_custom(3, Box::new(Hover)).is_some());
        assert!(table.custom(3).is_some());
        assert_eq!(table.custom_modes(), vec![1, 3]);
    }
}
