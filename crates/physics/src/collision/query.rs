//! Interfaces the locomotion core consumes from its host.
//!
//! The core never owns world geometry. Everything it knows about the world
//! comes through [`CollisionQuery`] (sweeps and traces) and
//! [`MovementBaseTracker`] (the platforms characters stand on). Both are
//! read-only: no method here mutates the world.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::flags::ContentFlags;
use super::hit::{BodyId, HitResult};

/// A capsule aligned with its local Z axis.
///
/// `half_height` includes the hemisphere caps, so it is never smaller than
/// `radius`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapsuleShape {
    pub radius: f32,
    pub half_height: f32,
}

impl CapsuleShape {
    pub fn new(radius: f32, half_height: f32) -> Self {
        Self {
            radius,
            half_height: half_height.max(radius),
        }
    }

    /// Half length of the cylindrical section between the caps.
    #[inline]
    pub fn segment_half_height(&self) -> f32 {
        (self.half_height - self.radius).max(0.0)
    }

    /// A smaller capsule for probing, never thinner than a tenth of a unit.
    pub fn shrunk(&self, radius_shrink: f32, height_shrink: f32) -> Self {
        let radius = (self.radius - radius_shrink).max(0.1);
        let half_height = (self.half_height - height_shrink).max(radius);
        Self { radius, half_height }
    }

    /// Finite, positive dimensions.
    pub fn is_valid(&self) -> bool {
        self.radius.is_finite()
            && self.half_height.is_finite()
            && self.radius > 0.0
            && self.half_height >= self.radius
    }
}

/// Which bodies a query may hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub mask: ContentFlags,
    /// Body skipped by the query, usually the querying character itself.
    pub ignore: Option<BodyId>,
}

impl QueryFilter {
    pub fn new(mask: ContentFlags) -> Self {
        Self { mask, ignore: None }
    }

    pub fn ignoring(mask: ContentFlags, body: Option<BodyId>) -> Self {
        Self { mask, ignore: body }
    }
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self::new(ContentFlags::MASK_PAWN_MOVEMENT)
    }
}

/// Sweep and trace queries against world geometry.
pub trait CollisionQuery {
    /// Sweep a capsule from `start` to `end` (capsule centres).
    ///
    /// A sweep that starts overlapping a body returns a blocking hit with
    /// `start_penetrating` set and `time == 0`.
    fn sweep_capsule(
        &self,
        start: Vec3,
        end: Vec3,
        rotation: Quat,
        capsule: CapsuleShape,
        filter: QueryFilter,
    ) -> HitResult;

    /// Trace a ray from `start` to `end`.
    fn line_trace(&self, start: Vec3, end: Vec3, filter: QueryFilter) -> HitResult;

    /// Whether `body` exists, has collision enabled and blocks `mask`.
    fn body_blocks(&self, body: BodyId, mask: ContentFlags) -> bool;
}

/// Position and rotation of a movement base.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaseTransform {
    pub location: Vec3,
    pub rotation: Quat,
}

impl BaseTransform {
    pub const IDENTITY: Self = Self {
        location: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    #[inline]
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.location + self.rotation * local
    }

    #[inline]
    pub fn inverse_transform_point(&self, world: Vec3) -> Vec3 {
        self.rotation.inverse() * (world - self.location)
    }
}

/// Platforms that characters can stand on and ride.
pub trait MovementBaseTracker {
    /// Current transform of `base`, or `None` if it no longer exists.
    fn base_transform(&self, base: BodyId) -> Option<BaseTransform>;

    /// Linear velocity of `base`.
    fn base_velocity(&self, _base: BodyId) -> Vec3 {
        Vec3::ZERO
    }

    /// Angular velocity of `base` (axis times radians per second).
    fn base_angular_velocity(&self, _base: BodyId) -> Vec3 {
        Vec3::ZERO
    }

    /// Whether `base` moves, so riders follow it and inherit its velocity.
    fn is_dynamic_base(&self, base: BodyId) -> bool;
}

/// Everything a movement tick needs from the host world.
pub trait MovementWorld: CollisionQuery + MovementBaseTracker {}

impl<T: CollisionQuery + MovementBaseTracker + ?Sized> MovementWorld for T {}
