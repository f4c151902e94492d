//! Collision channels and per-surface movement properties.
//!
//! Content flags decide which bodies a query collides with. Surface flags and
//! [`WalkableOverride`] decide how the locomotion core treats a surface once
//! it has been hit.

use serde::{Deserialize, Serialize};

/// Content flags describe what kind of volume a body is.
///
/// Queries take a mask of content flags and only report bodies whose contents
/// intersect that mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ContentFlags(pub u32);

impl ContentFlags {
    /// Empty space - nothing here.
    pub const EMPTY: Self = Self(0);

    /// Static or kinematic world geometry - floors, walls, platforms.
    pub const SOLID: Self = Self(1 << 0);

    /// Water volume - characters inside it swim.
    pub const WATER: Self = Self(1 << 1);

    /// Blocks characters but nothing else.
    pub const PAWN_CLIP: Self = Self(1 << 2);

    /// Another character's capsule.
    pub const PAWN: Self = Self(1 << 3);

    /// Trigger volume - never blocks movement.
    pub const TRIGGER: Self = Self(1 << 4);

    /// Standard mask for character movement sweeps.
    pub const MASK_PAWN_MOVEMENT: Self = Self(Self::SOLID.0 | Self::PAWN_CLIP.0 | Self::PAWN.0);

    /// Check if these flags contain a specific flag.
    #[inline]
    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Check if any of the given flags are set.
    #[inline]
    pub fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }
}

impl std::ops::BitOr for ContentFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitAnd for ContentFlags {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// Surface flags opt a body out of parts of the locomotion behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SurfaceFlags(pub u32);

impl SurfaceFlags {
    /// No special properties.
    pub const NONE: Self = Self(0);

    /// Characters may not step up onto this body.
    pub const NO_STEP_UP: Self = Self(1 << 0);

    /// Characters standing on this body do not follow it.
    pub const NO_BASE: Self = Self(1 << 1);

    /// Slippery - ground friction is ignored while walking on it.
    pub const SLICK: Self = Self(1 << 2);

    /// Check if these flags contain a specific flag.
    #[inline]
    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for SurfaceFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Per-surface adjustment of the walkable floor threshold.
///
/// The threshold is the minimum dot product between a surface's impact normal
/// and the capsule up axis for the surface to count as floor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum WalkableOverride {
    /// Use the character's configured threshold.
    #[default]
    Default,
    /// Allow steeper slopes, down to this threshold.
    Increase(f32),
    /// Only allow gentler slopes, up to this threshold.
    Decrease(f32),
    /// Never walkable.
    Unwalkable,
}

impl WalkableOverride {
    /// Apply this override to a character's walkable floor threshold.
    pub fn modify_walkable_floor_z(self, walkable_floor_z: f32) -> f32 {
        match self {
            WalkableOverride::Default => walkable_floor_z,
            WalkableOverride::Increase(z) => walkable_floor_z.min(z),
            WalkableOverride::Decrease(z) => walkable_floor_z.max(z),
            // Unreachable by any unit normal
            WalkableOverride::Unwalkable => 2.0,
        }
    }
}

/// Everything the locomotion core wants to know about a hit body's surface.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SurfaceProperties {
    pub flags: SurfaceFlags,
    pub walkable: WalkableOverride,
}

impl SurfaceProperties {
    /// Whether characters may step up onto this surface.
    #[inline]
    pub fn can_step_up(&self) -> bool {
        !self.flags.contains(SurfaceFlags::NO_STEP_UP)
    }

    /// Whether this surface may become a movement base.
    #[inline]
    pub fn can_be_base(&self) -> bool {
        !self.flags.contains(SurfaceFlags::NO_BASE)
    }
}
