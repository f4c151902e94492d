//! The character's capsule and its transform batches.
//!
//! Every move goes through [`CapsuleBody::move_by`]. Moves made while a
//! [`TransformBatch`] is open only touch the staged transform; the committed
//! transform (what other characters and the host see) changes when the
//! outermost batch commits. Reverting a batch restores the staged transform
//! exactly as it was when the batch began.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::collision::{BodyId, CapsuleShape, CollisionQuery, ContentFlags, HitResult, QueryFilter};
use crate::math::{KINDA_SMALL_NUMBER, SWEEP_PULLBACK};

/// Location and rotation of a capsule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapsuleTransform {
    pub location: Vec3,
    pub rotation: Quat,
}

/// Token for an open transform batch.
///
/// Hand it back to [`CapsuleBody::commit`] or [`CapsuleBody::revert`].
#[must_use = "a transform batch must be committed or reverted"]
#[derive(Debug, PartialEq, Eq)]
pub struct TransformBatch {
    depth: usize,
}

/// The capsule a character moves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapsuleBody {
    /// Collision dimensions.
    pub capsule: CapsuleShape,

    /// This capsule's own body in the world, skipped by its queries.
    pub self_id: Option<BodyId>,

    /// When false the capsule moves without sweeping and finds no floor.
    pub collision_enabled: bool,

    /// Content flags that block this capsule.
    pub collision_mask: ContentFlags,

    staged: CapsuleTransform,
    committed: CapsuleTransform,
    /// Staged transform at the start of each open batch, outermost first.
    batches: Vec<CapsuleTransform>,
}

impl CapsuleBody {
    pub fn new(capsule: CapsuleShape, location: Vec3, rotation: Quat) -> Self {
        let transform = CapsuleTransform {
            location,
            rotation: rotation.normalize(),
        };
        Self {
            capsule,
            self_id: None,
            collision_enabled: true,
            collision_mask: ContentFlags::MASK_PAWN_MOVEMENT,
            staged: transform,
            committed: transform,
            batches: Vec::new(),
        }
    }

    /// Current (staged) location of the capsule centre.
    #[inline]
    pub fn location(&self) -> Vec3 {
        self.staged.location
    }

    #[inline]
    pub fn rotation(&self) -> Quat {
        self.staged.rotation
    }

    /// Current (staged) transform.
    #[inline]
    pub fn transform(&self) -> CapsuleTransform {
        self.staged
    }

    /// Transform visible outside the current batch.
    #[inline]
    pub fn committed(&self) -> CapsuleTransform {
        self.committed
    }

    /// Capsule up axis.
    #[inline]
    pub fn up(&self) -> Vec3 {
        self.staged.rotation * Vec3::Z
    }

    /// Capsule forward axis.
    #[inline]
    pub fn forward(&self) -> Vec3 {
        self.staged.rotation * Vec3::X
    }

    /// Filter for this capsule's own queries.
    #[inline]
    pub fn filter(&self) -> QueryFilter {
        QueryFilter::ignoring(self.collision_mask, self.self_id)
    }

    /// Whether a batch is open.
    #[inline]
    pub fn is_batching(&self) -> bool {
        !self.batches.is_empty()
    }

    /// Place the capsule without sweeping.
    pub fn set_transform(&mut self, location: Vec3, rotation: Quat) {
        self.write(CapsuleTransform {
            location,
            rotation: rotation.normalize(),
        });
    }

    /// Open a batch. Batches nest.
    pub fn begin_batch(&mut self) -> TransformBatch {
        self.batches.push(self.staged);
        TransformBatch {
            depth: self.batches.len(),
        }
    }

    /// Keep the moves made since `batch` began.
    ///
    /// Committing the outermost batch publishes the staged transform.
    pub fn commit(&mut self, batch: TransformBatch) {
        self.close(batch);
        if self.batches.is_empty() {
            self.committed = self.staged;
        }
    }

    /// Discard the moves made since `batch` began.
    pub fn revert(&mut self, batch: TransformBatch) {
        if let Some(snapshot) = self.close(batch) {
            self.staged = snapshot;
        }
    }

    /// Move by `delta` and rotate to `rotation`.
    ///
    /// With `sweep` set, the capsule stops at the first blocking hit, backed
    /// off slightly from the surface. A sweep that starts penetrating does
    /// not move the capsule. Rotation is applied without sweeping.
    pub fn move_by<W: CollisionQuery + ?Sized>(
        &mut self,
        world: &W,
        delta: Vec3,
        rotation: Quat,
        sweep: bool,
    ) -> HitResult {
        let start = self.staged.location;
        let end = start + delta;
        let rotation = rotation.normalize();

        if !sweep || !self.collision_enabled || delta.length_squared() < KINDA_SMALL_NUMBER * KINDA_SMALL_NUMBER {
            self.write(CapsuleTransform { location: end, rotation });
            return HitResult::no_hit(start, end);
        }

        let mut hit = world.sweep_capsule(start, end, rotation, self.capsule, self.filter());
        if hit.blocking_hit {
            if hit.start_penetrating {
                hit.location = start;
            } else {
                pull_back(&mut hit, delta.length());
            }
            self.write(CapsuleTransform {
                location: hit.location,
                rotation,
            });
        } else {
            self.write(CapsuleTransform { location: end, rotation });
        }

        hit
    }

    fn write(&mut self, transform: CapsuleTransform) {
        self.staged = transform;
        if self.batches.is_empty() {
            self.committed = transform;
        }
    }

    /// Pop `batch` (and any batches opened inside it that were left open).
    fn close(&mut self, batch: TransformBatch) -> Option<CapsuleTransform> {
        if batch.depth != self.batches.len() {
            log::warn!(
                "transform batch closed out of order (depth {}, open {})",
                batch.depth,
                self.batches.len()
            );
        }
        let mut snapshot = None;
        while self.batches.len() >= batch.depth && !self.batches.is_empty() {
            snapshot = self.batches.pop();
        }
        snapshot
    }
}

/// Back a blocking hit off its surface by [`SWEEP_PULLBACK`].
///
/// Hits that would leave less than half the pullback of progress count as
/// no progress at all.
fn pull_back(hit: &mut HitResult, distance: f32) {
    if distance <= 0.0 {
        return;
    }
    let travel = hit.time * distance - SWEEP_PULLBACK;
    let time = if travel <= SWEEP_PULLBACK * 0.5 {
        0.0
    } else {
        (travel / distance).min(1.0)
    };
    hit.time = time;
    hit.distance = time * distance;
    hit.location = hit.trace_start + (hit.trace_end - hit.trace_start) * time;
}
