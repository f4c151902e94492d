//! End-to-end locomotion scenarios driven through the public API.

use glam::Vec3;
use gravwalk_physics::movement::{EventLog, MovementEvent, MovementMode, NullObserver};
use gravwalk_physics::{CapsuleShape, CollisionWorld, ContentFlags, LocomotionConfig, LocomotionStateMachine};

const DT: f32 = 1.0 / 60.0;
const RADIUS: f32 = 34.0;
const HALF_HEIGHT: f32 = 88.0;
/// Middle of the default floor clearance band.
const CLEARANCE: f32 = 2.15;

fn capsule() -> CapsuleShape {
    CapsuleShape::new(RADIUS, HALF_HEIGHT)
}

fn flat_world() -> CollisionWorld {
    let mut world = CollisionWorld::new();
    world.add_box(Vec3::new(0.0, 0.0, -50.0), Vec3::new(5000.0, 5000.0, 50.0), ContentFlags::SOLID);
    world
}

/// Floor for x <= 0, nothing beyond.
fn ledge_world() -> CollisionWorld {
    let mut world = CollisionWorld::new();
    world.add_box(Vec3::new(-2500.0, 0.0, -50.0), Vec3::new(2500.0, 2500.0, 50.0), ContentFlags::SOLID);
    world
}

/// Flat floor with a step of `height` whose face is at x = 100.
fn step_world(height: f32) -> CollisionWorld {
    let mut world = flat_world();
    world.add_box(
        Vec3::new(350.0, 0.0, height * 0.5),
        Vec3::new(250.0, 500.0, height * 0.5),
        ContentFlags::SOLID,
    );
    world
}

fn spawn(world: &CollisionWorld, config: LocomotionConfig, location: Vec3) -> LocomotionStateMachine {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut machine = LocomotionStateMachine::new(config, capsule()).unwrap();
    machine.spawn_at(world, location, &mut NullObserver);
    machine
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn flat_walk() {
    let world = flat_world();
    let config = LocomotionConfig {
        requested_move_use_acceleration: false,
        ..Default::default()
    };
    let mut machine = spawn(&world, config, Vec3::new(0.0, 0.0, 200.0));
    assert_eq!(machine.mode(), MovementMode::Walking);
    let start = machine.location();

    for _ in 0..60 {
        machine.request_direct_move(Vec3::new(100.0, 0.0, 0.0), false);
        machine.perform_movement_tick(&world, DT, &mut NullObserver).unwrap();
    }

    let moved = machine.location() - start;
    assert_eq!(machine.mode(), MovementMode::Walking);
    assert!(machine.velocity().z.abs() < 1e-3, "Vertical velocity {}", machine.velocity().z);
    assert!((moved.x - 100.0).abs() < 1.0, "Should walk 100 units, moved {moved}");
    assert!(moved.z.abs() < 0.5);
}

#[test]
fn flat_walk_holds_its_height_every_tick() {
    let world = flat_world();
    let mut machine = spawn(&world, LocomotionConfig::default(), Vec3::new(0.0, 0.0, 200.0));
    let max_floor_dist = machine.config().max_floor_dist;
    let start = machine.location();

    machine.set_input_acceleration(Vec3::X);
    for tick in 0..120 {
        machine.perform_movement_tick(&world, DT, &mut NullObserver).unwrap();
        let dz = machine.location().z - start.z;
        assert!(dz.abs() < max_floor_dist, "Tick {tick}: height changed by {dz}");
        assert_eq!(machine.mode(), MovementMode::Walking);
    }

    let floor_dist = machine.current_floor().floor_dist;
    assert!((floor_dist - CLEARANCE).abs() < 0.3, "Floor distance {floor_dist}");
    assert!(machine.location().x - start.x > 100.0);
}

#[test]
fn ledge_fall() {
    let world = ledge_world();
    let config = LocomotionConfig {
        requested_move_use_acceleration: false,
        ..Default::default()
    };
    let mut machine = spawn(&world, config, Vec3::new(-50.0, 0.0, 200.0));
    assert_eq!(machine.mode(), MovementMode::Walking);

    let mut events = EventLog::new();
    let mut fell_at = None;
    for _ in 0..120 {
        machine.request_direct_move(Vec3::new(100.0, 0.0, 0.0), false);
        machine.perform_movement_tick(&world, DT, &mut events).unwrap();
        if machine.is_falling() {
            fell_at = Some(machine.location());
            break;
        }
    }

    let fell_at = fell_at.expect("Should fall off the ledge");
    assert!(fell_at.x > 0.0 && fell_at.x < RADIUS + 5.0, "Fell at {fell_at}");
    assert!(events.events.contains(&MovementEvent::ModeChanged {
        previous: MovementMode::Walking,
        current: MovementMode::Falling,
    }));

    // Nothing below to land on.
    for _ in 0..30 {
        machine.perform_movement_tick(&world, DT, &mut NullObserver).unwrap();
        let location = machine.location();
        let valid = machine.with_context(&world, &mut NullObserver, |ctx| {
            let down = ctx.gravity_direction(true);
            let hit = ctx
                .world
                .sweep_capsule(location, location + down * 1000.0, ctx.rotation(), ctx.capsule(), ctx.filter());
            ctx.is_valid_landing_spot(location, &hit)
        });
        assert!(!valid);
        assert!(machine.is_falling());
    }
    assert!(machine.location().z < fell_at.z);
}

#[test]
fn walking_stops_at_ledge_when_not_allowed_off() {
    let world = ledge_world();
    let config = LocomotionConfig {
        can_walk_off_ledges: false,
        ..Default::default()
    };
    let mut machine = spawn(&world, config, Vec3::new(-100.0, 0.0, 200.0));
    machine.set_input_acceleration(Vec3::X);

    for _ in 0..120 {
        machine.perform_movement_tick(&world, DT, &mut NullObserver).unwrap();
    }

    assert_eq!(machine.mode(), MovementMode::Walking);
    assert!(machine.current_floor().is_walkable_floor());
    assert!(machine.location().x < RADIUS + 5.0);
}

#[test]
fn step_below_max_height_is_climbed() {
    let world = step_world(44.0);
    let mut machine = spawn(&world, LocomotionConfig::default(), Vec3::new(0.0, 0.0, 200.0));
    machine.set_input_acceleration(Vec3::X);

    for _ in 0..40 {
        machine.perform_movement_tick(&world, DT, &mut NullObserver).unwrap();
    }

    let location = machine.location();
    assert_eq!(machine.mode(), MovementMode::Walking);
    assert!(location.x > 150.0, "Should be past the step face, at {location}");
    let bottom = location.z - HALF_HEIGHT;
    assert!((bottom - 44.0 - CLEARANCE).abs() < 0.5, "Should stand on the step, bottom at {bottom}");
}

#[test]
fn step_above_max_height_blocks() {
    let world = step_world(46.0);
    let mut machine = spawn(&world, LocomotionConfig::default(), Vec3::new(0.0, 0.0, 200.0));
    let start_z = machine.location().z;
    machine.set_input_acceleration(Vec3::X);

    for _ in 0..60 {
        machine.perform_movement_tick(&world, DT, &mut NullObserver).unwrap();
    }

    let location = machine.location();
    assert_eq!(machine.mode(), MovementMode::Walking);
    assert!(location.x < 100.0 - RADIUS + 0.5, "Should be stopped by the step, at {location}");
    assert!((location.z - start_z).abs() < 0.5);
}

#[test]
fn failed_step_up_leaves_transform_unchanged() {
    let world = step_world(46.0);
    let mut machine = spawn(&world, LocomotionConfig::default(), Vec3::new(0.0, 0.0, 200.0));

    machine.with_context(&world, &mut NullObserver, |ctx| {
        let rotation = ctx.rotation();
        let hit = ctx.safe_move(Vec3::X * 100.0, rotation, true);
        assert!(hit.is_valid_blocking_hit());

        let before = ctx.state.body.transform();
        let down = ctx.gravity_direction(true);
        assert!(!ctx.step_up(down, Vec3::X * 60.0, &hit, None));
        assert_eq!(ctx.state.body.transform(), before);
    });
}

#[test]
fn floor_query_is_idempotent() {
    let world = flat_world();
    let mut machine = spawn(&world, LocomotionConfig::default(), Vec3::new(0.0, 0.0, 200.0));
    let location = machine.location();

    let (first, second) = machine.with_context(&world, &mut NullObserver, |ctx| {
        let first = ctx.find_floor(location, true, None);
        let second = ctx.find_floor(location, true, None);
        (first, second)
    });

    assert!(first.is_walkable_floor());
    assert_eq!(first, second);
}

#[test]
fn velocity_never_exceeds_max_speed() {
    let world = flat_world();
    let mut machine = spawn(&world, LocomotionConfig::default(), Vec3::new(0.0, 0.0, 200.0));
    let max_speed = machine.config().max_walk_speed;

    machine.with_context(&world, &mut NullObserver, |ctx| {
        ctx.state.velocity = Vec3::X * 900.0;
        ctx.state.acceleration = Vec3::NEG_X * ctx.config.max_acceleration;
        ctx.state.analog_input_modifier = 1.0;

        // Slows down until the input turns it around.
        let mut previous = ctx.state.velocity.length();
        while ctx.state.velocity.x > 0.0 {
            ctx.calc_velocity(DT, ctx.config.ground_friction, false, ctx.config.braking_deceleration_walking);
            let speed = ctx.state.velocity.length();
            assert!(speed <= previous + 1e-3, "Speed went up from {previous} to {speed}");
            previous = speed;
        }
        for _ in 0..120 {
            ctx.calc_velocity(DT, ctx.config.ground_friction, false, ctx.config.braking_deceleration_walking);
            assert!(ctx.state.velocity.length() <= max_speed + 1e-3);
        }

        ctx.state.velocity = Vec3::ZERO;
        ctx.state.acceleration = Vec3::Y * ctx.config.max_acceleration;
        for _ in 0..120 {
            ctx.calc_velocity(DT, ctx.config.ground_friction, false, ctx.config.braking_deceleration_walking);
            assert!(ctx.state.velocity.length() <= max_speed + 1e-3);
        }
    });
}

#[test]
fn setting_the_same_mode_is_silent() {
    let world = flat_world();
    let mut machine = spawn(&world, LocomotionConfig::default(), Vec3::new(0.0, 0.0, 200.0));
    let mut events = EventLog::new();

    machine.set_movement_mode(&world, MovementMode::Walking, &mut events);
    assert_eq!(events.mode_changes(), 0);

    machine.set_movement_mode(&world, MovementMode::Custom(1), &mut events);
    machine.set_movement_mode(&world, MovementMode::Custom(1), &mut events);
    assert_eq!(events.mode_changes(), 1);

    machine.set_movement_mode(&world, MovementMode::Custom(2), &mut events);
    assert_eq!(events.mode_changes(), 2);
}

#[test]
fn walking_is_the_same_in_any_gravity_direction() {
    let directions = [
        Vec3::NEG_Z,
        Vec3::X,
        Vec3::NEG_Y,
        Vec3::new(1.0, 1.0, -1.0).normalize(),
    ];

    let mut results = Vec::new();
    for gravity in directions {
        let up = -gravity;
        let tangent = up.any_orthonormal_vector();

        let mut world = CollisionWorld::new();
        world.add_plane(Vec3::ZERO, up, ContentFlags::SOLID);

        let mut machine = LocomotionStateMachine::new(LocomotionConfig::default(), capsule()).unwrap();
        machine.set_gravity_direction(gravity);
        machine.spawn_at(&world, up * 300.0, &mut NullObserver);
        assert_eq!(machine.mode(), MovementMode::Walking, "No floor under gravity {gravity}");
        let start = machine.location();

        machine.set_input_acceleration(tangent);
        for _ in 0..60 {
            machine.perform_movement_tick(&world, DT, &mut NullObserver).unwrap();
        }

        assert_eq!(machine.mode(), MovementMode::Walking);
        assert!(machine.up().abs_diff_eq(up, 1e-3));
        let height = machine.location().dot(up) - HALF_HEIGHT;
        assert!((height - CLEARANCE).abs() < 0.3, "Height {height} under gravity {gravity}");
        assert!(machine.velocity().dot(up).abs() < 1e-2);

        let moved = machine.location() - start;
        results.push((moved.dot(tangent), machine.velocity().length()));
    }

    let (distance, speed) = results[0];
    for (other_distance, other_speed) in &results[1..] {
        assert!((other_distance - distance).abs() < 1.0, "{other_distance} vs {distance}");
        assert!((other_speed - speed).abs() < 1.0, "{other_speed} vs {speed}");
    }
}

#[test]
fn moving_platform_carries_its_rider() {
    let mut world = flat_world();
    let platform = world.add_box(Vec3::new(0.0, 0.0, 50.0), Vec3::new(200.0, 200.0, 10.0), ContentFlags::SOLID);
    let mut machine = spawn(&world, LocomotionConfig::default(), Vec3::new(0.0, 0.0, 300.0));
    assert_eq!(machine.movement_base(), Some(platform));
    let start = machine.location();

    for frame in 1..=60 {
        let offset = Vec3::X * 2.0 * frame as f32;
        world.move_body(platform, Vec3::new(0.0, 0.0, 50.0) + offset, glam::Quat::IDENTITY, DT);
        machine.perform_movement_tick(&world, DT, &mut NullObserver).unwrap();
    }

    let moved = machine.location() - start;
    assert_eq!(machine.mode(), MovementMode::Walking);
    assert!((moved.x - 120.0).abs() < 1.0, "Should ride the platform, moved {moved}");
    assert!(moved.z.abs() < 0.5);
}

#[test]
fn deterministic_replay() {
    let world = step_world(30.0);
    let run = || {
        let mut machine = spawn(&world, LocomotionConfig::default(), Vec3::new(-200.0, 30.0, 200.0));
        for frame in 0..180 {
            let angle = frame as f32 * 0.05;
            machine.set_input_acceleration(Vec3::new(angle.cos(), angle.sin(), 0.0));
            if frame % 45 == 0 {
                machine.jump();
            }
            machine.perform_movement_tick(&world, DT, &mut NullObserver).unwrap();
        }
        (machine.location(), machine.velocity(), machine.mode())
    };

    assert_eq!(run(), run());
}
