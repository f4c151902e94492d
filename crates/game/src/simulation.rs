//! Game simulation - the fixed-step loop.
//!
//! This module advances every character and platform in a level by one
//! tick at a time. Given the same level, config and inputs, two runs produce
//! the same results.

use std::path::Path;

use gravwalk_physics::{CapsuleShape, LocomotionConfig, MovementMode};
use serde::{Deserialize, Serialize};

use crate::character::{Character, EntityId};
use crate::error::GameError;
use crate::input::CharacterInput;
use crate::level::Level;

/// Game simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulation tick rate (ticks per second).
    pub tick_rate: u32,

    /// Locomotion tunables shared by every character.
    pub locomotion: LocomotionConfig,

    /// Character capsule.
    pub capsule: CapsuleShape,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            locomotion: LocomotionConfig::default(),
            capsule: CapsuleShape::new(34.0, 88.0),
        }
    }
}

impl SimulationConfig {
    /// Get the time step per tick in seconds.
    pub fn delta_time(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }

    /// Check every field is usable.
    pub fn validate(&self) -> Result<(), GameError> {
        if self.tick_rate == 0 {
            return Err(GameError::ZeroTickRate);
        }
        self.locomotion.validate()?;
        Ok(())
    }

    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, GameError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, GameError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read and parse a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GameError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| GameError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }
}

/// The main game simulation.
///
/// Holds the level and its characters and advances them with a fixed
/// time step driven by per-character inputs.
#[derive(Debug)]
pub struct Simulation {
    /// Current frame/tick number.
    pub frame: u64,

    /// Seconds simulated so far.
    pub time: f32,

    /// Simulation configuration.
    pub config: SimulationConfig,

    /// Current level.
    pub level: Level,

    /// All characters in the game.
    pub characters: Vec<Character>,

    /// Next entity ID to assign.
    next_entity_id: EntityId,
}

impl Simulation {
    /// Create a new simulation with the given configuration and level.
    pub fn new(config: SimulationConfig, level: Level) -> Result<Self, GameError> {
        config.validate()?;
        if let Some(locomotion) = &level.locomotion {
            locomotion.validate()?;
            log::info!("{} brings its own locomotion tunables", level.name);
        }
        Ok(Self {
            frame: 0,
            time: 0.0,
            config,
            level,
            characters: Vec::new(),
            next_entity_id: 1,
        })
    }

    /// Add a character at the level's next spawn point.
    ///
    /// Returns the character's ID.
    pub fn add_character(&mut self, name: &str) -> Result<EntityId, GameError> {
        let spawn = *self
            .level
            .spawn_point(self.characters.len())
            .ok_or_else(|| GameError::NoSpawnPoint(self.level.id.clone()))?;

        let id = self.next_entity_id;
        let mut character = Character::new(id, name, self.locomotion_config(), self.config.capsule)?;
        character.facing = spawn.facing;
        character
            .machine
            .set_gravity_direction(self.level.gravity.direction_at(spawn.position));
        character
            .machine
            .spawn_at(&self.level.collision, spawn.position, &mut character.events);
        log::info!(
            "{} joined {} at {} ({})",
            character.name,
            self.level.name,
            character.location(),
            character.mode().name()
        );

        self.next_entity_id += 1;
        self.characters.push(character);
        Ok(id)
    }

    /// Locomotion tunables new characters get in the current level.
    pub fn locomotion_config(&self) -> &LocomotionConfig {
        self.level.locomotion.as_ref().unwrap_or(&self.config.locomotion)
    }

    /// Remove a character from the simulation.
    pub fn remove_character(&mut self, id: EntityId) {
        self.characters.retain(|c| c.id != id);
    }

    /// Get a character by ID.
    pub fn character(&self, id: EntityId) -> Option<&Character> {
        self.characters.iter().find(|c| c.id == id)
    }

    /// Get a mutable reference to a character by ID.
    pub fn character_mut(&mut self, id: EntityId) -> Option<&mut Character> {
        self.characters.iter_mut().find(|c| c.id == id)
    }

    /// Advance the simulation by one tick.
    ///
    /// # Arguments
    ///
    /// * `inputs` - Character inputs indexed by position in `characters`
    pub fn tick(&mut self, inputs: &[CharacterInput]) -> Result<(), GameError> {
        let delta_time = self.config.delta_time();
        self.time += delta_time;

        // Platforms move first so riders follow them this tick.
        for platform in &self.level.platforms {
            let (location, rotation) = platform.transform_at(self.time);
            self.level
                .collision
                .move_body(platform.body, location, rotation, delta_time);
        }

        let world = &self.level.collision;
        for (i, character) in self.characters.iter_mut().enumerate() {
            let input = inputs.get(i).copied().unwrap_or_default();

            let gravity = self.level.gravity.direction_at(character.location());
            character.machine.set_gravity_direction(gravity);

            let flying = character.mode() == MovementMode::Flying;
            if input.actions.fly && !flying {
                character
                    .machine
                    .set_movement_mode(world, MovementMode::Flying, &mut character.events);
            } else if !input.actions.fly && flying {
                character
                    .machine
                    .set_default_movement_mode(world, &mut character.events);
            }

            character.apply_input(&input);

            let report = character
                .machine
                .perform_movement_tick(world, delta_time, &mut character.events)?;
            if report.hit_iteration_cap {
                log::debug!("{} ran out of iterations on frame {}", character.name, self.frame);
            }
            if report.mode_before != report.mode_after {
                log::debug!(
                    "{}: {} -> {}",
                    character.name,
                    report.mode_before.name(),
                    report.mode_after.name()
                );
            }
        }

        self.frame += 1;
        Ok(())
    }

    /// Get the delta time for this simulation.
    pub fn delta_time(&self) -> f32 {
        self.config.delta_time()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use gravwalk_physics::MovementEvent;

    fn simulation(level: Level) -> Simulation {
        Simulation::new(SimulationConfig::default(), level).unwrap()
    }

    fn forward() -> CharacterInput {
        let mut input = CharacterInput::default();
        input.movement.forward = true;
        input
    }

    fn run(sim: &mut Simulation, input: CharacterInput, ticks: usize) {
        for _ in 0..ticks {
            sim.tick(&[input]).unwrap();
        }
    }

    #[test]
    fn test_simulation_creation() {
        let sim = simulation(Level::flat());
        assert_eq!(sim.frame, 0);
        assert!(sim.characters.is_empty());
    }

    #[test]
    fn test_rejects_zero_tick_rate() {
        let config = SimulationConfig {
            tick_rate: 0,
            ..Default::default()
        };
        assert!(matches!(
            Simulation::new(config, Level::flat()),
            Err(GameError::ZeroTickRate)
        ));
    }

    #[test]
    fn test_add_character() {
        let mut sim = simulation(Level::flat());

        let id = sim.add_character("Walker").unwrap();
        assert!(id > 0);
        assert_eq!(sim.characters.len(), 1);

        let character = sim.character(id).unwrap();
        assert_eq!(character.name, "Walker");
        assert_eq!(character.mode(), MovementMode::Walking);
        assert!((character.location().z - 90.15).abs() < 0.5);
    }

    #[test]
    fn test_add_character_without_spawns() {
        let mut sim = simulation(Level::new("empty", "Empty"));
        assert!(matches!(sim.add_character("Nobody"), Err(GameError::NoSpawnPoint(_))));
    }

    #[test]
    fn test_tick_advances_frame() {
        let mut sim = simulation(Level::flat());
        sim.add_character("Test").unwrap();

        sim.tick(&[CharacterInput::default()]).unwrap();
        assert_eq!(sim.frame, 1);

        sim.tick(&[]).unwrap();
        assert_eq!(sim.frame, 2);
    }

    #[test]
    fn test_movement_input() {
        let mut sim = simulation(Level::flat());
        let id = sim.add_character("Test").unwrap();
        let start = sim.character(id).unwrap().location();

        run(&mut sim, forward(), 60);

        let character = sim.character(id).unwrap();
        let moved = character.location() - start;
        assert!(moved.x > 300.0, "Character should have moved, moved={moved}");
        assert!(moved.z.abs() < 0.5);
        assert_eq!(character.mode(), MovementMode::Walking);
    }

    #[test]
    fn test_walks_off_ledge_and_lands() {
        let mut sim = simulation(Level::ledge());
        let id = sim.add_character("Test").unwrap();

        run(&mut sim, forward(), 150);

        let character = sim.character_mut(id).unwrap();
        assert_eq!(character.mode(), MovementMode::Walking);
        assert!(character.location().z < -400.0);
        let events = character.drain_events();
        assert!(events.iter().any(|e| matches!(e, MovementEvent::Landed { .. })));
    }

    #[test]
    fn test_climbs_stairs() {
        let mut sim = simulation(Level::stairs());
        let id = sim.add_character("Test").unwrap();

        run(&mut sim, forward(), 120);

        let character = sim.character(id).unwrap();
        assert!(character.location().z > 235.0, "Should be on the landing, at {}", character.location());
        assert!(character.is_on_ground());
        assert!(character.machine.config().always_check_floor);
    }

    #[test]
    fn test_walks_around_planet() {
        let mut sim = simulation(Level::planet());
        let id = sim.add_character("Test").unwrap();
        assert_eq!(sim.character(id).unwrap().mode(), MovementMode::Walking);

        run(&mut sim, forward(), 120);

        let character = sim.character(id).unwrap();
        let location = character.location();
        let altitude = location.length();
        assert_eq!(character.mode(), MovementMode::Walking);
        assert!((2085.0..2097.0).contains(&altitude), "altitude {altitude}");
        assert!(location.z < 2080.0, "Should have walked over the curve, at {location}");
        assert!(character.machine.up().abs_diff_eq(location / altitude, 0.01));
        assert_eq!(character.machine.config(), &LocomotionConfig::low_gravity());
    }

    #[test]
    fn test_walks_on_wall() {
        let mut sim = simulation(Level::wall());
        let id = sim.add_character("Test").unwrap();
        let start = sim.character(id).unwrap().location();
        assert!((start.x - 90.15).abs() < 0.5);

        run(&mut sim, forward(), 60);

        let character = sim.character(id).unwrap();
        let location = character.location();
        assert_eq!(character.mode(), MovementMode::Walking);
        assert!((location.x - start.x).abs() < 0.5);
        assert!((location - start).length() > 300.0);
    }

    #[test]
    fn test_platform_carries_character() {
        let mut sim = simulation(Level::platform());
        let id = sim.add_character("Rider").unwrap();
        let start = sim.character(id).unwrap().location();

        run(&mut sim, CharacterInput::default(), 60);

        let platform = sim.level.platforms[0];
        let (platform_location, _) = platform.transform_at(sim.time);
        let carried = platform_location - platform.origin;
        let moved = sim.character(id).unwrap().location() - start;
        assert!(carried.x > 300.0);
        assert!((moved.x - carried.x).abs() < 5.0, "moved {moved}, platform {carried}");
    }

    #[test]
    fn test_swims_in_pool() {
        let mut sim = simulation(Level::pool());
        let id = sim.add_character("Swimmer").unwrap();

        run(&mut sim, forward(), 180);

        let character = sim.character_mut(id).unwrap();
        let events = character.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            MovementEvent::ModeChanged {
                current: MovementMode::Swimming,
                ..
            }
        )));
    }

    #[test]
    fn test_fly_toggle() {
        let mut sim = simulation(Level::flat());
        let id = sim.add_character("Pilot").unwrap();

        let mut input = CharacterInput::default();
        input.actions.fly = true;
        input.movement.ascend = true;
        run(&mut sim, input, 30);

        let character = sim.character(id).unwrap();
        assert_eq!(character.mode(), MovementMode::Flying);
        assert!(character.location().z > 100.0);

        run(&mut sim, CharacterInput::default(), 1);
        assert_ne!(sim.character(id).unwrap().mode(), MovementMode::Flying);
    }

    #[test]
    fn test_jump() {
        let mut sim = simulation(Level::flat());
        let id = sim.add_character("Test").unwrap();

        let mut input = CharacterInput::default();
        input.actions.jump = true;
        run(&mut sim, input, 1);
        assert_eq!(sim.character(id).unwrap().mode(), MovementMode::Falling);

        run(&mut sim, CharacterInput::default(), 120);
        assert_eq!(sim.character(id).unwrap().mode(), MovementMode::Walking);
    }

    #[test]
    fn test_determinism() {
        // Run simulation twice with same inputs - should get same results
        let inputs: Vec<_> = (0..200)
            .map(|i| {
                let mut input = CharacterInput::default();
                input.movement.forward = i % 2 == 0;
                input.movement.right = i % 3 == 0;
                input.actions.jump = i % 40 == 0;
                input.turn = 0.02;
                input
            })
            .collect();

        let replay = || {
            let mut sim = simulation(Level::stairs());
            let id = sim.add_character("Test").unwrap();
            for input in &inputs {
                sim.tick(&[*input]).unwrap();
            }
            let character = sim.character(id).unwrap();
            (character.location(), character.velocity())
        };

        assert_eq!(replay(), replay());
    }

    #[test]
    fn test_config_json() {
        let config = SimulationConfig::from_json(r#"{ "tick_rate": 30 }"#).unwrap();
        assert_eq!(config.tick_rate, 30);
        assert_eq!(config.locomotion, LocomotionConfig::default());

        let json = config.to_json().unwrap();
        assert_eq!(SimulationConfig::from_json(&json).unwrap(), config);

        assert!(matches!(SimulationConfig::from_json("{ nope"), Err(GameError::Json(_))));
        assert!(matches!(
            SimulationConfig::from_json(r#"{ "locomotion": { "mass": -1.0 } }"#),
            Err(GameError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = SimulationConfig::load("/nonexistent/gravwalk.json").unwrap_err();
        assert!(matches!(err, GameError::Io { .. }));
    }
}
