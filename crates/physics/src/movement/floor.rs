//! Floor detection.
//!
//! The floor under a capsule is found with a downward capsule sweep, retried
//! with a smaller capsule when the first hit is too close to the rim or
//! starts penetrating, then with a line trace along the capsule axis. A hit
//! near the rim of a narrow ledge can still count as floor when a reduced
//! "perch" probe finds walkable ground.
//!
//! # Caching
//!
//! [`FloorCache`] holds the last accepted [`FloorResult`]. While the
//! character stands still on a static base that blocks it, the cached result
//! is reused instead of querying again. Marking the cache dirty forces the
//! next query.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::context::MoveContext;
use crate::collision::{CapsuleShape, HitResult};
use crate::math::{project_onto_plane, safe_normal, KINDA_SMALL_NUMBER, THRESH_NORMALS_ARE_PARALLEL};

/// Best known floor under the capsule.
///
/// `walkable` implies `blocking_hit`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FloorResult {
    /// A blocking surface was found within the probe distance.
    pub blocking_hit: bool,

    /// The surface can be stood on.
    pub walkable: bool,

    /// The result came from the line trace rather than the sweep.
    pub line_trace: bool,

    /// Distance from the capsule bottom to the surface along the sweep.
    pub floor_dist: f32,

    /// Distance from the capsule bottom to the surface along the line trace.
    pub line_dist: f32,

    /// The hit that produced this result.
    pub hit: HitResult,
}

impl FloorResult {
    /// Result of a sweep.
    pub fn from_sweep(hit: HitResult, sweep_floor_dist: f32, walkable: bool) -> Self {
        let blocking_hit = hit.is_valid_blocking_hit();
        Self {
            blocking_hit,
            walkable: walkable && blocking_hit,
            line_trace: false,
            floor_dist: sweep_floor_dist,
            line_dist: 0.0,
            hit,
        }
    }

    /// Replace the normals and body with those of a line trace hit.
    ///
    /// Only applies when both the current sweep hit and `hit` block. The
    /// sweep's time and locations are kept.
    pub fn set_from_line_trace(&mut self, hit: HitResult, sweep_floor_dist: f32, line_dist: f32, walkable: bool) {
        if !(self.hit.blocking_hit && hit.blocking_hit) {
            return;
        }
        let old = self.hit;
        self.hit = HitResult {
            time: old.time,
            impact_point: old.impact_point,
            location: old.location,
            trace_start: old.trace_start,
            trace_end: old.trace_end,
            ..hit
        };
        self.line_trace = true;
        self.floor_dist = sweep_floor_dist;
        self.line_dist = line_dist;
        self.walkable = walkable && self.blocking_hit;
    }

    /// Forget the floor.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// A blocking, walkable floor.
    #[inline]
    pub fn is_walkable_floor(&self) -> bool {
        self.blocking_hit && self.walkable
    }

    /// Distance to the floor from whichever probe produced the result.
    #[inline]
    pub fn distance_to_floor(&self) -> f32 {
        if self.line_trace {
            self.line_dist
        } else {
            self.floor_dist
        }
    }
}

/// The current floor plus bookkeeping about its freshness.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FloorCache {
    current: FloorResult,
    generation: u64,
    dirty: bool,
}

impl FloorCache {
    #[inline]
    pub fn current(&self) -> &FloorResult {
        &self.current
    }

    /// Edit the stored result in place.
    pub fn current_mut(&mut self) -> &mut FloorResult {
        self.generation += 1;
        &mut self.current
    }

    /// Number of times the stored result has been replaced or edited.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Store a fresh result.
    pub fn store(&mut self, result: FloorResult) {
        self.current = result;
        self.generation += 1;
    }

    /// Forget the floor.
    pub fn clear(&mut self) {
        self.store(FloorResult::default());
    }

    /// Whether the next query must not reuse the cache.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Force the next floor query.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}

/// Classifies the surface beneath a capsule.
pub trait FloorScanner {
    /// Find the floor under a capsule at `location`.
    ///
    /// `zero_delta` means the capsule has not moved since the cached floor
    /// was computed. `downward_sweep` is a hit from a downward move that may
    /// stand in for the first sweep.
    fn find_floor(
        &self,
        ctx: &mut MoveContext<'_>,
        location: Vec3,
        zero_delta: bool,
        downward_sweep: Option<&HitResult>,
    ) -> FloorResult;

    /// Probe for a floor within `sweep_distance` (capsule sweep with
    /// `sweep_radius`) or `line_distance` (line trace) of the capsule bottom.
    fn compute_floor_dist(
        &self,
        ctx: &MoveContext<'_>,
        location: Vec3,
        line_distance: f32,
        sweep_distance: f32,
        sweep_radius: f32,
        downward_sweep: Option<&HitResult>,
    ) -> FloorResult;

    /// Whether a character may stand on `hit`.
    fn is_walkable(&self, ctx: &MoveContext<'_>, hit: &HitResult) -> bool;

    /// Whether `impact_point` lies far enough inside the rim of a capsule
    /// at `capsule_location` to be trusted.
    fn is_within_edge_tolerance(
        &self,
        ctx: &MoveContext<'_>,
        capsule_location: Vec3,
        impact_point: Vec3,
        capsule_radius: f32,
    ) -> bool;

    /// Whether `hit` is far enough from the axis to need a perch probe.
    fn should_compute_perch_result(&self, ctx: &MoveContext<'_>, hit: &HitResult, check_radius: bool) -> bool;

    /// Probe with `test_radius` for a walkable floor within
    /// `max_floor_dist` of the capsule bottom at `hit`.
    fn compute_perch_result(
        &self,
        ctx: &MoveContext<'_>,
        test_radius: f32,
        hit: &HitResult,
        max_floor_dist: f32,
    ) -> Option<FloorResult>;
}

/// Radius of the perch probe.
pub fn valid_perch_radius(capsule: CapsuleShape, perch_radius_threshold: f32) -> f32 {
    (capsule.radius - perch_radius_threshold.max(0.0)).clamp(0.11, capsule.radius)
}

/// Squared distance of `point` from the capsule axis through `location`.
#[inline]
fn axis_distance_sq(location: Vec3, point: Vec3, up: Vec3) -> f32 {
    project_onto_plane(point - location, up).length_squared()
}

/// Sweep- and trace-based [`FloorScanner`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepFloorScanner;

impl SweepFloorScanner {
    pub fn new() -> Self {
        Self
    }

    fn sweep_down(&self, ctx: &MoveContext<'_>, location: Vec3, distance: f32, shape: CapsuleShape) -> HitResult {
        let down = -ctx.up();
        ctx.world
            .sweep_capsule(location, location + down * distance, ctx.rotation(), shape, ctx.filter())
    }
}

impl FloorScanner for SweepFloorScanner {
    fn find_floor(
        &self,
        ctx: &mut MoveContext<'_>,
        location: Vec3,
        zero_delta: bool,
        downward_sweep: Option<&HitResult>,
    ) -> FloorResult {
        if !ctx.state.body.collision_enabled {
            return FloorResult::default();
        }

        let config = ctx.config;
        let radius = ctx.capsule().radius;

        // Probe a little further while walking so that the floor height
        // adjustment cannot invalidate the result.
        let height_check_adjust = if ctx.is_moving_on_ground() {
            config.max_floor_dist + KINDA_SMALL_NUMBER
        } else {
            -config.max_floor_dist
        };
        let sweep_distance = config.max_floor_dist.max(config.max_step_height + height_check_adjust);
        let line_distance = sweep_distance;
        let mut need_to_validate = true;

        let mut result = FloorResult::default();
        if line_distance > 0.0 || sweep_distance > 0.0 {
            let must_compute = config.always_check_floor
                || !zero_delta
                || ctx.state.floor.is_dirty()
                || ctx.state.flags.just_teleported();

            let reuse = !must_compute
                && match ctx.state.base.base {
                    Some(base) => {
                        let stable = ctx.world.body_blocks(base, ctx.state.body.collision_mask)
                            && !ctx.world.is_dynamic_base(base);
                        if !stable {
                            ctx.state.floor.mark_dirty();
                        }
                        stable
                    }
                    None => false,
                };

            if reuse {
                log::trace!("reusing cached floor");
                result = *ctx.state.floor.current();
                need_to_validate = false;
            } else {
                ctx.state.floor.clear_dirty();
                result = self.compute_floor_dist(ctx, location, line_distance, sweep_distance, radius, downward_sweep);
            }
        }

        // See whether a hit near the rim can still be stood on.
        if need_to_validate && result.blocking_hit && !result.line_trace && self.should_compute_perch_result(ctx, &result.hit, true) {
            let mut max_perch_floor_dist = config.max_floor_dist.max(config.max_step_height + height_check_adjust);
            if ctx.is_moving_on_ground() {
                max_perch_floor_dist += config.perch_additional_height.max(0.0);
            }

            let perch_radius = valid_perch_radius(ctx.capsule(), config.perch_radius_threshold);
            match self.compute_perch_result(ctx, perch_radius, &result.hit, max_perch_floor_dist) {
                Some(perch) => {
                    // Do not let the height adjustment lift us beyond the
                    // perch distance, or we would fall next time.
                    let avg_floor_dist = (config.min_floor_dist + config.max_floor_dist) * 0.5;
                    let move_up_dist = avg_floor_dist - result.floor_dist;
                    if move_up_dist + perch.floor_dist >= max_perch_floor_dist {
                        result.floor_dist = avg_floor_dist;
                    }

                    if !result.walkable {
                        let floor_dist = result.floor_dist;
                        result.set_from_line_trace(perch.hit, floor_dist, perch.floor_dist.min(perch.line_dist), true);
                    }
                }
                None => {
                    result.walkable = false;
                }
            }
        }

        result
    }

    fn compute_floor_dist(
        &self,
        ctx: &MoveContext<'_>,
        location: Vec3,
        line_distance: f32,
        sweep_distance: f32,
        sweep_radius: f32,
        downward_sweep: Option<&HitResult>,
    ) -> FloorResult {
        let mut result = FloorResult::default();
        if !ctx.state.body.collision_enabled {
            return result;
        }

        let capsule = ctx.capsule();
        let down = -ctx.up();
        let max_penetration_adjust = ctx.config.max_floor_dist.max(capsule.radius);

        let mut skip_sweep = false;
        if let Some(prior) = downward_sweep.filter(|hit| hit.is_valid_blocking_hit()) {
            // Only a sweep straight down along the capsule axis can stand in.
            let dir = safe_normal(prior.trace_end - prior.trace_start);
            if down.dot(dir) >= THRESH_NORMALS_ARE_PARALLEL
                && self.is_within_edge_tolerance(ctx, prior.location, prior.impact_point, capsule.radius)
            {
                skip_sweep = true;
                let walkable = self.is_walkable(ctx, prior);
                let floor_dist = (location - prior.location).length();
                result = FloorResult::from_sweep(*prior, floor_dist, walkable);
                if walkable {
                    return result;
                }
            }
        }

        if sweep_distance < line_distance {
            log::warn!("floor sweep distance {sweep_distance} shorter than line distance {line_distance}");
            return result;
        }

        if !skip_sweep && sweep_distance > 0.0 && sweep_radius > 0.0 {
            // Sweep a shorter capsule so that starting on a surface does not
            // give a zero-time hit, and so we can pull out of penetration.
            const SHRINK_SCALE: f32 = 0.9;
            const SHRINK_SCALE_OVERLAP: f32 = 0.1;
            let mut shrink_height = (capsule.half_height - capsule.radius) * (1.0 - SHRINK_SCALE);
            let mut trace_dist = sweep_distance + shrink_height;
            let mut shape = CapsuleShape {
                radius: sweep_radius,
                half_height: (capsule.half_height - shrink_height).max(sweep_radius),
            };

            let mut hit = self.sweep_down(ctx, location, trace_dist, shape);
            if hit.blocking_hit {
                // Only hits on the bottom of the capsule count. Retry hits
                // near the rim with a thinner, shorter capsule.
                if hit.start_penetrating || !self.is_within_edge_tolerance(ctx, location, hit.impact_point, shape.radius) {
                    shrink_height = (capsule.half_height - capsule.radius) * (1.0 - SHRINK_SCALE_OVERLAP);
                    trace_dist = sweep_distance + shrink_height;
                    shape.radius = (shape.radius - ctx.config.edge_reject_distance - KINDA_SMALL_NUMBER).max(0.0);
                    shape.half_height = (capsule.half_height - shrink_height).max(shape.radius);
                    hit = if shape.radius > 0.0 {
                        self.sweep_down(ctx, location, trace_dist, shape)
                    } else {
                        ctx.world.line_trace(location, location + down * trace_dist, ctx.filter())
                    };
                }

                // Negative distances are allowed so we can pull out of
                // penetration.
                let sweep_result = (-max_penetration_adjust).max(hit.time * trace_dist - shrink_height);
                result = FloorResult::from_sweep(hit, sweep_result, false);
                if hit.is_valid_blocking_hit() && self.is_walkable(ctx, &hit) && sweep_result <= sweep_distance {
                    result.walkable = true;
                    return result;
                }
            }
        }

        // The sweep is longer than the line trace, so a complete miss means
        // the line trace would miss too. A penetrating sweep still gets one.
        if !result.blocking_hit && !result.hit.start_penetrating {
            result.floor_dist = sweep_distance;
            return result;
        }

        if line_distance > 0.0 {
            let shrink_height = capsule.half_height;
            let trace_dist = line_distance + shrink_height;
            let hit = ctx.world.line_trace(location, location + down * trace_dist, ctx.filter());

            if hit.blocking_hit && hit.time > 0.0 {
                let line_result = (-max_penetration_adjust).max(hit.time * trace_dist - shrink_height);
                result.blocking_hit = true;
                if line_result <= line_distance && self.is_walkable(ctx, &hit) {
                    let floor_dist = result.floor_dist;
                    result.set_from_line_trace(hit, floor_dist, line_result, true);
                    return result;
                }
            }
        }

        result.walkable = false;
        result.floor_dist = sweep_distance;
        result
    }

    fn is_walkable(&self, ctx: &MoveContext<'_>, hit: &HitResult) -> bool {
        if !hit.is_valid_blocking_hit() {
            return false;
        }
        let walkable_floor_z = hit.surface.walkable.modify_walkable_floor_z(ctx.config.walkable_floor_z);
        hit.impact_normal.dot(ctx.up()) >= walkable_floor_z
    }

    fn is_within_edge_tolerance(
        &self,
        ctx: &MoveContext<'_>,
        capsule_location: Vec3,
        impact_point: Vec3,
        capsule_radius: f32,
    ) -> bool {
        let dist_sq = axis_distance_sq(capsule_location, impact_point, ctx.up());
        let reduced_radius = (capsule_radius - ctx.config.edge_reject_distance).max(KINDA_SMALL_NUMBER);
        dist_sq < reduced_radius * reduced_radius
    }

    fn should_compute_perch_result(&self, ctx: &MoveContext<'_>, hit: &HitResult, check_radius: bool) -> bool {
        if !hit.is_valid_blocking_hit() {
            return false;
        }

        // Perching onto a very thin rim is not worth a probe.
        if ctx.config.perch_radius_threshold <= ctx.config.edge_reject_distance {
            return false;
        }

        if check_radius {
            let dist_sq = axis_distance_sq(hit.location, hit.impact_point, ctx.up());
            let perch_radius = valid_perch_radius(ctx.capsule(), ctx.config.perch_radius_threshold);
            if dist_sq <= perch_radius * perch_radius {
                return false;
            }
        }

        true
    }

    fn compute_perch_result(
        &self,
        ctx: &MoveContext<'_>,
        test_radius: f32,
        hit: &HitResult,
        max_floor_dist: f32,
    ) -> Option<FloorResult> {
        if max_floor_dist <= 0.0 {
            return None;
        }

        // Sweep further than asked: the thinner capsule can miss surfaces
        // the full one would touch.
        let capsule = ctx.capsule();
        let up = ctx.up();
        let hit_above_base = ((hit.impact_point - hit.location).dot(up) + capsule.half_height).max(0.0);
        let perch_line_dist = (max_floor_dist - hit_above_base).max(0.0);
        let perch_sweep_dist = max_floor_dist.max(0.0);
        let actual_sweep_dist = perch_sweep_dist + capsule.radius;

        let perch = self.compute_floor_dist(ctx, hit.location, perch_line_dist, actual_sweep_dist, test_radius, None);
        if !perch.is_walkable_floor() {
            return None;
        }
        if hit_above_base + perch.floor_dist > max_floor_dist {
            log::trace!("perch floor beyond max distance");
            return None;
        }
        Some(perch)
    }
}
