//! Notifications from the state machine to its host.
//!
//! Callbacks run in the middle of a tick. They may ask for a new movement
//! mode, a launch or a teleport through the [`MovementControl`] they are
//! handed; the request is applied as soon as the callback returns, and the
//! running mode re-checks its state before continuing.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::state::MovementMode;
use crate::collision::HitResult;

/// Requests an observer can make from inside a callback.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MovementControl {
    pub(crate) requested_mode: Option<MovementMode>,
    pub(crate) just_teleported: bool,
    pub(crate) launch: Option<Vec3>,
}

impl MovementControl {
    /// Switch to `mode` once the callback returns.
    pub fn set_movement_mode(&mut self, mode: MovementMode) {
        self.requested_mode = Some(mode);
    }

    /// Treat the rest of the tick as if the character was teleported.
    pub fn mark_teleported(&mut self) {
        self.just_teleported = true;
    }

    /// Launch the character with `velocity` at the start of the next tick.
    pub fn launch(&mut self, velocity: Vec3) {
        self.launch = Some(velocity);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.requested_mode.is_none() && !self.just_teleported && self.launch.is_none()
    }
}

/// Receives movement notifications. Every method defaults to doing nothing.
pub trait MovementObserver {
    /// The movement mode changed from `previous` to `current`.
    fn on_movement_mode_changed(
        &mut self,
        _previous: MovementMode,
        _current: MovementMode,
        _control: &mut MovementControl,
    ) {
    }

    /// The character landed on `hit` while falling.
    fn on_landed(&mut self, _hit: &HitResult, _control: &mut MovementControl) {}

    /// The character started falling.
    fn on_falling(&mut self, _control: &mut MovementControl) {}

    /// The up-axis velocity stopped being positive while falling.
    fn on_reached_jump_apex(&mut self, _control: &mut MovementControl) {}

    /// A move was blocked by `hit`.
    fn on_move_blocked(&mut self, _hit: &HitResult) {}

    /// Walking stepped off the floor at `previous_location`.
    fn on_walking_off_ledge(&mut self, _previous_floor_normal: Vec3, _previous_location: Vec3) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl MovementObserver for NullObserver {}

/// One recorded notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MovementEvent {
    ModeChanged {
        previous: MovementMode,
        current: MovementMode,
    },
    Landed {
        location: Vec3,
        normal: Vec3,
    },
    StartedFalling,
    ReachedJumpApex,
    MoveBlocked {
        normal: Vec3,
    },
    WalkedOffLedge {
        location: Vec3,
    },
}

/// Observer that records every notification in order.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    pub events: Vec<MovementEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return the recorded events.
    pub fn drain(&mut self) -> Vec<MovementEvent> {
        std::mem::take(&mut self.events)
    }

    /// Number of recorded mode changes.
    pub fn mode_changes(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, MovementEvent::ModeChanged { .. }))
            .count()
    }
}

impl MovementObserver for EventLog {
    fn on_movement_mode_changed(
        &mut self,
        previous: MovementMode,
        current: MovementMode,
        _control: &mut MovementControl,
    ) {
        self.events.push(MovementEvent::ModeChanged { previous, current });
    }

    fn on_landed(&mut self, hit: &HitResult, _control: &mut MovementControl) {
        self.events.push(MovementEvent::Landed {
            location: hit.location,
            normal: hit.impact_normal,
        });
    }

    fn on_falling(&mut self, _control: &mut MovementControl) {
        self.events.push(MovementEvent::StartedFalling);
    }

    fn on_reached_jump_apex(&mut self, _control: &mut MovementControl) {
        self.events.push(MovementEvent::ReachedJumpApex);
    }

    fn on_move_blocked(&mut self, hit: &HitResult) {
        self.events.push(MovementEvent::MoveBlocked {
            normal: hit.impact_normal,
        });
    }

    fn on_walking_off_ledge(&mut self, _previous_floor_normal: Vec3, previous_location: Vec3) {
        self.events.push(MovementEvent::WalkedOffLedge {
            location: previous_location,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_records_requests() {
        let mut control = MovementControl::default();
        assert!(control.is_empty());

        control.set_movement_mode(MovementMode::Flying);
        control.launch(Vec3::Z);
        assert_eq!(control.requested_mode, Some(MovementMode::Flying));
        assert_eq!(control.launch, Some(Vec3::Z));
        assert!(!control.is_empty());
    }

    #[test]
    fn test_event_log() {
        let mut log = EventLog::new();
        let mut control = MovementControl::default();

        log.on_movement_mode_changed(MovementMode::Walking, MovementMode::Falling, &mut control);
        log.on_falling(&mut control);
        assert_eq!(log.mode_changes(), 1);
        assert_eq!(log.events.len(), 2);

        let drained = log.drain();
        assert_eq!(drained[1], MovementEvent::StartedFalling);
        assert!(log.events.is_empty());
    }
}
