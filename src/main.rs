//! Gravwalk - headless locomotion runner.
//!
//! Drives one scripted character through a built-in level and prints where
//! it went. Set `RUST_LOG=debug` to see mode transitions as they happen.
//!
//! Usage: `gravwalk [level] [seconds] [config.json]`

use std::process::ExitCode;

use gravwalk_game::{CharacterInput, GameError, Level, MovementEvent, Simulation, SimulationConfig, LEVEL_NAMES};

/// Seconds between scripted jumps.
const JUMP_INTERVAL: u64 = 3;

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), GameError> {
    let mut args = std::env::args().skip(1);
    let level_name = args.next().unwrap_or_else(|| "flat".to_string());
    let seconds: f32 = args.next().and_then(|s| s.parse().ok()).unwrap_or(5.0);
    let config = match args.next() {
        Some(path) => SimulationConfig::load(path)?,
        None => SimulationConfig::default(),
    };

    let level = Level::by_name(&level_name).ok_or_else(|| {
        log::warn!("known levels: {}", LEVEL_NAMES.join(", "));
        GameError::UnknownLevel(level_name.clone())
    })?;

    let tick_rate = u64::from(config.tick_rate);
    let mut sim = Simulation::new(config, level)?;
    let id = sim.add_character("walker")?;

    let ticks = (seconds.max(0.0) * tick_rate as f32) as u64;
    log::info!("running {} for {ticks} ticks", sim.level.name);

    let mut mode_changes = 0;
    let mut landings = 0;
    for frame in 0..ticks {
        sim.tick(&[scripted_input(frame, tick_rate)])?;

        let time = sim.time;
        let Some(character) = sim.character_mut(id) else {
            break;
        };
        for event in character.drain_events() {
            match event {
                MovementEvent::ModeChanged { previous, current } => {
                    mode_changes += 1;
                    log::info!("frame {frame}: {} -> {}", previous.name(), current.name());
                }
                MovementEvent::Landed { location, .. } => {
                    landings += 1;
                    log::debug!("frame {frame}: landed at {location}");
                }
                _ => {}
            }
        }

        if frame % tick_rate == 0 {
            println!(
                "t={:5.2}s  location={:.1}  speed={:6.1}  mode={}",
                time,
                character.location(),
                character.velocity().length(),
                character.mode().name()
            );
        }
    }

    if let Some(character) = sim.character(id) {
        println!(
            "{} after {} frames: location={:.1} mode={} mode changes={mode_changes} landings={landings}",
            sim.level.name,
            sim.frame,
            character.location(),
            character.mode().name()
        );
    }
    Ok(())
}

/// Walk forward, turning gently, with a jump every few seconds.
fn scripted_input(frame: u64, tick_rate: u64) -> CharacterInput {
    let mut input = CharacterInput::default();
    input.movement.forward = true;
    input.turn = 0.2 / tick_rate as f32;
    input.actions.jump = frame > 0 && frame % (JUMP_INTERVAL * tick_rate) == 0;
    input.frame = frame as u32;
    input
}
