//! Level definition and built-in test levels.
//!
//! A level is static collision, a gravity field, spawn points and any
//! kinematic platforms that move on a fixed schedule.

use glam::{Quat, Vec3};
use gravwalk_physics::{BodyId, CollisionWorld, ContentFlags, LocomotionConfig};
use serde::{Deserialize, Serialize};

/// Names accepted by [`Level::by_name`].
pub const LEVEL_NAMES: &[&str] = &["flat", "ledge", "stairs", "planet", "wall", "platform", "pool"];

/// Where gravity points inside a level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GravityField {
    /// World gravity along -Z.
    Ambient,
    /// One fixed direction everywhere.
    Uniform { direction: Vec3 },
    /// Toward a point, as on a small planet.
    Radial { center: Vec3 },
}

impl GravityField {
    /// Gravity direction override at `location`.
    ///
    /// Zero means "no override", which leaves world gravity in charge.
    pub fn direction_at(&self, location: Vec3) -> Vec3 {
        match *self {
            Self::Ambient => Vec3::ZERO,
            Self::Uniform { direction } => direction.normalize_or_zero(),
            Self::Radial { center } => (center - location).normalize_or_zero(),
        }
    }
}

/// A spawn point in the level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub position: Vec3,
    /// Initial heading about the local up axis (radians).
    pub facing: f32,
}

/// A body that oscillates and spins on a fixed schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicPlatform {
    pub body: BodyId,
    pub origin: Vec3,
    /// Peak offset from `origin`; zero for a platform that only spins.
    pub travel: Vec3,
    /// Seconds per full oscillation.
    pub period: f32,
    /// Spin about world Z (radians per second).
    pub spin: f32,
}

impl KinematicPlatform {
    /// Platform transform `time` seconds after the level started.
    pub fn transform_at(&self, time: f32) -> (Vec3, Quat) {
        let phase = if self.period > 0.0 {
            (std::f32::consts::TAU * time / self.period).sin()
        } else {
            0.0
        };
        (self.origin + self.travel * phase, Quat::from_rotation_z(self.spin * time))
    }
}

/// A game level.
#[derive(Debug)]
pub struct Level {
    /// Level identifier.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Collision geometry.
    pub collision: CollisionWorld,

    /// Spawn points.
    pub spawn_points: Vec<SpawnPoint>,

    /// Gravity field.
    pub gravity: GravityField,

    /// Moving bodies, animated by the simulation each tick.
    pub platforms: Vec<KinematicPlatform>,

    /// Locomotion tunables for characters in this level, replacing the
    /// simulation's when set.
    pub locomotion: Option<LocomotionConfig>,
}

impl Level {
    /// Create an empty level.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            collision: CollisionWorld::new(),
            spawn_points: Vec::new(),
            gravity: GravityField::Ambient,
            platforms: Vec::new(),
            locomotion: None,
        }
    }

    /// Look up a built-in level.
    pub fn by_name(name: &str) -> Option<Self> {
        let level = match name {
            "flat" => Self::flat(),
            "ledge" => Self::ledge(),
            "stairs" => Self::stairs(),
            "planet" => Self::planet(),
            "wall" => Self::wall(),
            "platform" => Self::platform(),
            "pool" => Self::pool(),
            _ => return None,
        };
        Some(level)
    }

    fn add_spawn(&mut self, position: Vec3, facing: f32) {
        self.spawn_points.push(SpawnPoint { position, facing });
    }

    /// Large flat floor with its top at z = 0.
    pub fn flat() -> Self {
        let mut level = Self::new("flat", "Flat Plane");
        level
            .collision
            .add_box(Vec3::new(0.0, 0.0, -50.0), Vec3::new(5000.0, 5000.0, 50.0), ContentFlags::SOLID);
        level.add_spawn(Vec3::new(0.0, 0.0, 200.0), 0.0);
        level.add_spawn(Vec3::new(0.0, 400.0, 200.0), 0.0);
        level
    }

    /// A floor that ends at x = 0, with a lower floor 500 below.
    pub fn ledge() -> Self {
        let mut level = Self::new("ledge", "Ledge");
        level
            .collision
            .add_box(Vec3::new(-2500.0, 0.0, -50.0), Vec3::new(2500.0, 2500.0, 50.0), ContentFlags::SOLID);
        level
            .collision
            .add_box(Vec3::new(2500.0, 0.0, -550.0), Vec3::new(2500.0, 2500.0, 50.0), ContentFlags::SOLID);
        level.add_spawn(Vec3::new(-300.0, 0.0, 200.0), 0.0);
        level
    }

    /// Five 30-high stairs starting at x = 200, then a 60-high wall.
    pub fn stairs() -> Self {
        const RISE: f32 = 30.0;
        const TREAD: f32 = 60.0;

        let mut level = Self::flat();
        level.id = "stairs".into();
        level.name = "Stairs".into();
        for i in 0..5 {
            let height = RISE * (i + 1) as f32;
            let start = 200.0 + TREAD * i as f32;
            level.collision.add_box(
                Vec3::new(start + TREAD * 0.5, 0.0, height * 0.5),
                Vec3::new(TREAD * 0.5, 500.0, height * 0.5),
                ContentFlags::SOLID,
            );
        }
        let top = RISE * 5.0;
        let landing = 200.0 + TREAD * 5.0;
        level.collision.add_box(
            Vec3::new(landing + 500.0, 0.0, top * 0.5),
            Vec3::new(500.0, 500.0, top * 0.5),
            ContentFlags::SOLID,
        );
        level.collision.add_box(
            Vec3::new(landing + 1000.0 + 25.0, 0.0, (top + 60.0) * 0.5),
            Vec3::new(25.0, 500.0, (top + 60.0) * 0.5),
            ContentFlags::SOLID,
        );
        level.spawn_points.truncate(1);
        level.locomotion = Some(LocomotionConfig::precise());
        level
    }

    /// A ball of radius 2000 at the origin with gravity toward its centre.
    pub fn planet() -> Self {
        let mut level = Self::new("planet", "Planet");
        level.collision.add_ball(Vec3::ZERO, 2000.0, ContentFlags::SOLID);
        level.gravity = GravityField::Radial { center: Vec3::ZERO };
        level.locomotion = Some(LocomotionConfig::low_gravity());
        level.add_spawn(Vec3::new(0.0, 0.0, 2300.0), 0.0);
        level.add_spawn(Vec3::new(2300.0, 0.0, 0.0), 0.0);
        level
    }

    /// A wall at x = 0 that is the floor, with gravity along -X.
    pub fn wall() -> Self {
        let mut level = Self::new("wall", "Wall Walk");
        level
            .collision
            .add_box(Vec3::new(-50.0, 0.0, 0.0), Vec3::new(50.0, 5000.0, 5000.0), ContentFlags::SOLID);
        level.gravity = GravityField::Uniform { direction: Vec3::NEG_X };
        level.add_spawn(Vec3::new(300.0, 0.0, 0.0), 0.0);
        level
    }

    /// Flat floor with a platform sliding along X and one spinning in place.
    pub fn platform() -> Self {
        let mut level = Self::flat();
        level.id = "platform".into();
        level.name = "Moving Platforms".into();
        level.spawn_points.clear();

        let slider_origin = Vec3::new(0.0, 0.0, 100.0);
        let slider = level
            .collision
            .add_box(slider_origin, Vec3::new(200.0, 200.0, 20.0), ContentFlags::SOLID);
        level.platforms.push(KinematicPlatform {
            body: slider,
            origin: slider_origin,
            travel: Vec3::new(600.0, 0.0, 0.0),
            period: 8.0,
            spin: 0.0,
        });

        let spinner_origin = Vec3::new(0.0, 1500.0, 60.0);
        let spinner = level
            .collision
            .add_box(spinner_origin, Vec3::new(300.0, 300.0, 20.0), ContentFlags::SOLID);
        level.platforms.push(KinematicPlatform {
            body: spinner,
            origin: spinner_origin,
            travel: Vec3::ZERO,
            period: 0.0,
            spin: 0.5,
        });

        level.add_spawn(Vec3::new(0.0, 0.0, 300.0), 0.0);
        level.add_spawn(Vec3::new(200.0, 1500.0, 300.0), 0.0);
        level
    }

    /// A deck with its top at z = 0, then a 400-deep pool filled to the brim
    /// for x in [-1000, 1000].
    pub fn pool() -> Self {
        let mut level = Self::new("pool", "Pool");
        let solid = ContentFlags::SOLID;
        level
            .collision
            .add_box(Vec3::new(-2000.0, 0.0, -50.0), Vec3::new(1000.0, 3000.0, 50.0), solid);
        level
            .collision
            .add_box(Vec3::new(2000.0, 0.0, -50.0), Vec3::new(1000.0, 3000.0, 50.0), solid);
        level
            .collision
            .add_box(Vec3::new(0.0, 0.0, -450.0), Vec3::new(1000.0, 3000.0, 50.0), solid);
        level
            .collision
            .add_box(Vec3::new(0.0, 0.0, -200.0), Vec3::new(1000.0, 3000.0, 200.0), ContentFlags::WATER);
        level.add_spawn(Vec3::new(-1300.0, 0.0, 200.0), 0.0);
        level
    }

    /// Spawn point for the `index`-th character, cycling through them.
    pub fn spawn_point(&self, index: usize) -> Option<&SpawnPoint> {
        if self.spawn_points.is_empty() {
            return None;
        }
        self.spawn_points.get(index % self.spawn_points.len())
    }
}
