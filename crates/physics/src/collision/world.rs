//! Collision world containing all static and kinematic geometry.
//!
//! The world stores parry3d shapes with a transform, content flags and
//! surface properties, and answers capsule sweeps and line traces through the
//! [`CollisionQuery`] trait. Kinematic bodies moved with
//! [`CollisionWorld::move_body`] become movement bases that characters ride.

use glam::{Quat, Vec3};
use parry3d::math::{Isometry, Point, Real, Vector};
use parry3d::na::{Quaternion, Translation3, Unit, UnitQuaternion};
use parry3d::query::{
    self, PointQuery, Ray, RayCast, ShapeCastHit, ShapeCastOptions, ShapeCastStatus,
};
use parry3d::shape::{Capsule, SharedShape};

use super::flags::{ContentFlags, SurfaceProperties};
use super::hit::{BodyId, HitResult};
use super::query::{
    BaseTransform, CapsuleShape, CollisionQuery, MovementBaseTracker, QueryFilter,
};
use crate::math::{safe_normal, KINDA_SMALL_NUMBER};

/// Local-space distance within which a point counts as lying on a box face.
const FACE_SNAP_TOLERANCE: f32 = 0.05;

/// Overlap shallower than this counts as touching, not penetrating.
const CONTACT_TOLERANCE: f32 = 1.0e-3;

/// A piece of collision geometry in the world.
#[derive(Debug, Clone)]
pub struct CollisionBody {
    /// Unique identifier for this body.
    pub id: BodyId,
    /// The collision shape.
    pub shape: SharedShape,
    /// Position in world space.
    pub location: Vec3,
    /// Orientation in world space.
    pub rotation: Quat,
    /// Content flags (solid, water, trigger, etc.).
    pub contents: ContentFlags,
    /// Movement-relevant surface properties.
    pub surface: SurfaceProperties,
    /// Disabled bodies are invisible to every query.
    pub collision_enabled: bool,
    /// Moved by the host every tick; riders follow it.
    pub dynamic: bool,
    /// Velocity derived from the last [`CollisionWorld::move_body`].
    pub linear_velocity: Vec3,
    /// Angular velocity derived from the last [`CollisionWorld::move_body`].
    pub angular_velocity: Vec3,
}

impl CollisionBody {
    fn isometry(&self) -> Isometry<Real> {
        to_isometry(self.location, self.rotation)
    }

    /// Face normal at `world_point`, choosing the face most opposed to
    /// `direction` when the point lies on an edge.
    ///
    /// Only boxes have faces to choose from; other shapes keep `fallback`.
    fn face_normal(&self, world_point: Vec3, direction: Vec3, fallback: Vec3) -> (Vec3, Vec3) {
        let Some(cuboid) = self.shape.as_cuboid() else {
            return (world_point, fallback);
        };

        let inv = self.rotation.inverse();
        let local_point = inv * (world_point - self.location);
        let local_dir = inv * direction;
        let half = Vec3::new(
            cuboid.half_extents.x,
            cuboid.half_extents.y,
            cuboid.half_extents.z,
        );

        let mut best: Option<(f32, usize, Vec3)> = None;
        for axis in 0..3 {
            for sign in [-1.0_f32, 1.0] {
                if (local_point[axis] - sign * half[axis]).abs() > FACE_SNAP_TOLERANCE {
                    continue;
                }
                let mut normal = Vec3::ZERO;
                normal[axis] = sign;
                let opposition = normal.dot(local_dir);
                if best.map_or(true, |(o, _, _)| opposition < o) {
                    best = Some((opposition, axis, normal));
                }
            }
        }

        match best {
            Some((_, axis, local_normal)) => {
                let mut snapped = local_point;
                snapped[axis] = local_normal[axis] * half[axis];
                (
                    self.location + self.rotation * snapped,
                    self.rotation * local_normal,
                )
            }
            None => (world_point, fallback),
        }
    }
}

/// The collision world containing all geometry.
///
/// Supports:
/// - Boxes (axis-aligned and oriented)
/// - Infinite planes
/// - Spheres (planets)
/// - Convex hulls and triangle meshes
#[derive(Debug, Default)]
pub struct CollisionWorld {
    bodies: Vec<CollisionBody>,
    next_id: BodyId,
}

impl CollisionWorld {
    /// Create an empty collision world.
    pub fn new() -> Self {
        Self {
            bodies: Vec::new(),
            next_id: 0,
        }
    }

    /// Add an arbitrary shape at a transform.
    pub fn add_shape(
        &mut self,
        shape: SharedShape,
        location: Vec3,
        rotation: Quat,
        contents: ContentFlags,
    ) -> BodyId {
        let id = self.next_id;
        self.next_id += 1;

        self.bodies.push(CollisionBody {
            id,
            shape,
            location,
            rotation,
            contents,
            surface: SurfaceProperties::default(),
            collision_enabled: true,
            dynamic: false,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
        });

        id
    }

    /// Add an axis-aligned box to the world.
    ///
    /// # Arguments
    ///
    /// * `center` - Center position of the box in world space
    /// * `half_extents` - Half-size in each axis (x, y, z)
    /// * `contents` - Content flags for collision filtering
    pub fn add_box(&mut self, center: Vec3, half_extents: Vec3, contents: ContentFlags) -> BodyId {
        self.add_oriented_box(center, half_extents, Quat::IDENTITY, contents)
    }

    /// Add a rotated box to the world.
    pub fn add_oriented_box(
        &mut self,
        center: Vec3,
        half_extents: Vec3,
        rotation: Quat,
        contents: ContentFlags,
    ) -> BodyId {
        let shape = SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z);
        self.add_shape(shape, center, rotation, contents)
    }

    /// Add an infinite plane through `point` facing `normal`.
    ///
    /// Everything behind the plane is solid.
    pub fn add_plane(&mut self, point: Vec3, normal: Vec3, contents: ContentFlags) -> BodyId {
        let n = safe_normal(normal);
        let shape = SharedShape::halfspace(Unit::new_normalize(to_vector(n)));
        self.add_shape(shape, point, Quat::IDENTITY, contents)
    }

    /// Add a sphere to the world.
    pub fn add_ball(&mut self, center: Vec3, radius: f32, contents: ContentFlags) -> BodyId {
        self.add_shape(SharedShape::ball(radius), center, Quat::IDENTITY, contents)
    }

    /// Add a convex hull to the world.
    ///
    /// Returns `None` if the hull couldn't be computed.
    pub fn add_convex_hull(&mut self, points: &[Vec3], contents: ContentFlags) -> Option<BodyId> {
        let parry_points: Vec<Point<Real>> =
            points.iter().map(|p| Point::new(p.x, p.y, p.z)).collect();

        let shape = SharedShape::convex_hull(&parry_points)?;
        Some(self.add_shape(shape, Vec3::ZERO, Quat::IDENTITY, contents))
    }

    /// Add a triangle mesh to the world.
    ///
    /// Returns `None` if the mesh is degenerate.
    pub fn add_triangle_mesh(
        &mut self,
        vertices: &[Vec3],
        indices: &[[u32; 3]],
        contents: ContentFlags,
    ) -> Option<BodyId> {
        let parry_vertices: Vec<Point<Real>> =
            vertices.iter().map(|v| Point::new(v.x, v.y, v.z)).collect();

        let shape = SharedShape::trimesh(parry_vertices, indices.to_vec()).ok()?;
        Some(self.add_shape(shape, Vec3::ZERO, Quat::IDENTITY, contents))
    }

    /// Replace the surface properties of a body.
    pub fn set_surface(&mut self, id: BodyId, surface: SurfaceProperties) {
        if let Some(body) = self.body_mut(id) {
            body.surface = surface;
        }
    }

    /// Enable or disable collision for a body.
    pub fn set_collision_enabled(&mut self, id: BodyId, enabled: bool) {
        if let Some(body) = self.body_mut(id) {
            body.collision_enabled = enabled;
        }
    }

    /// Move a kinematic body to a new transform over `delta_time`.
    ///
    /// The body becomes a dynamic movement base, and its velocities are
    /// derived from the displacement so riders can inherit them.
    pub fn move_body(&mut self, id: BodyId, location: Vec3, rotation: Quat, delta_time: f32) {
        let Some(body) = self.body_mut(id) else {
            return;
        };

        if delta_time > KINDA_SMALL_NUMBER {
            body.linear_velocity = (location - body.location) / delta_time;
            let (axis, angle) = (rotation * body.rotation.inverse()).to_axis_angle();
            let angle = if angle > std::f32::consts::PI {
                angle - std::f32::consts::TAU
            } else {
                angle
            };
            body.angular_velocity = axis * (angle / delta_time);
        }
        body.location = location;
        body.rotation = rotation.normalize();
        body.dynamic = true;
    }

    /// Look up a body.
    pub fn body(&self, id: BodyId) -> Option<&CollisionBody> {
        self.bodies.iter().find(|b| b.id == id)
    }

    fn body_mut(&mut self, id: BodyId) -> Option<&mut CollisionBody> {
        self.bodies.iter_mut().find(|b| b.id == id)
    }

    /// Remove a body. Returns whether it existed.
    pub fn remove_body(&mut self, id: BodyId) -> bool {
        let before = self.bodies.len();
        self.bodies.retain(|b| b.id != id);
        self.bodies.len() != before
    }

    /// Remove all collision geometry.
    pub fn clear(&mut self) {
        self.bodies.clear();
    }

    /// Get the number of collision bodies.
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    // ========================================================================
    // Private helpers
    // ========================================================================

    fn candidates(&self, filter: QueryFilter) -> impl Iterator<Item = &CollisionBody> {
        self.bodies.iter().filter(move |b| {
            b.collision_enabled && filter.mask.intersects(b.contents) && Some(b.id) != filter.ignore
        })
    }

    /// Overlap test for a capsule that is not moving.
    fn overlap_capsule(
        &self,
        location: Vec3,
        rotation: Quat,
        capsule: &Capsule,
        filter: QueryFilter,
    ) -> HitResult {
        let iso = to_isometry(location, rotation);
        let mut result = HitResult::no_hit(location, location);

        for body in self.candidates(filter) {
            if let Some(hit) = penetration_hit(&iso, capsule, body, location) {
                if !result.blocking_hit || hit.penetration_depth > result.penetration_depth {
                    result = hit;
                }
            }
        }

        result
    }

    fn build_sweep_hit(
        &self,
        start: Vec3,
        delta: Vec3,
        rotation: Quat,
        body: &CollisionBody,
        cast: &ShapeCastHit,
    ) -> HitResult {
        let end = start + delta;
        let time = cast.time_of_impact.clamp(0.0, 1.0);
        let location = start + delta * time;

        let normal = safe_normal(-(rotation * from_vector(&cast.normal1.into_inner())));
        let witness = body.isometry() * cast.witness2;
        let fallback = body.rotation * from_vector(&cast.normal2.into_inner());
        let (impact_point, impact_normal) =
            body.face_normal(from_point(&witness), delta, safe_normal(fallback));

        HitResult {
            blocking_hit: true,
            start_penetrating: false,
            time,
            distance: delta.length() * time,
            location,
            impact_point,
            normal,
            impact_normal,
            trace_start: start,
            trace_end: end,
            penetration_depth: 0.0,
            body: Some(body.id),
            contents: body.contents,
            surface: body.surface,
        }
    }
}

impl CollisionQuery for CollisionWorld {
    fn sweep_capsule(
        &self,
        start: Vec3,
        end: Vec3,
        rotation: Quat,
        capsule: CapsuleShape,
        filter: QueryFilter,
    ) -> HitResult {
        let shape = Capsule::new_z(capsule.segment_half_height(), capsule.radius);
        let delta = end - start;

        // No movement - just check if the position is free
        if delta.length_squared() < KINDA_SMALL_NUMBER * KINDA_SMALL_NUMBER {
            let mut hit = self.overlap_capsule(start, rotation, &shape, filter);
            hit.trace_end = end;
            return hit;
        }

        let start_iso = to_isometry(start, rotation);
        let velocity = to_vector(delta);
        let options = ShapeCastOptions {
            max_time_of_impact: 1.0,
            target_distance: 0.0,
            stop_at_penetration: true,
            compute_impact_geometry_on_penetration: true,
        };

        let mut closest: Option<(&CollisionBody, ShapeCastHit)> = None;
        for body in self.candidates(filter) {
            let cast = query::cast_shapes(
                &start_iso,
                &velocity,
                &shape,
                &body.isometry(),
                &Vector::zeros(),
                body.shape.as_ref(),
                options,
            );
            let Ok(Some(cast)) = cast else {
                continue;
            };

            if cast.status == ShapeCastStatus::PenetratingOrWithinTargetDist {
                if let Some(mut hit) = penetration_hit(&start_iso, &shape, body, start) {
                    hit.trace_end = end;
                    return hit;
                }
                // Touching only: moving away or along the surface is free.
                if !moves_into_contact(&start_iso, &shape, body, delta) {
                    continue;
                }
            }

            let is_closer = closest
                .as_ref()
                .map_or(true, |(_, best)| cast.time_of_impact < best.time_of_impact);
            if is_closer {
                closest = Some((body, cast));
            }
        }

        match closest {
            Some((body, cast)) => self.build_sweep_hit(start, delta, rotation, body, &cast),
            None => HitResult::no_hit(start, end),
        }
    }

    fn line_trace(&self, start: Vec3, end: Vec3, filter: QueryFilter) -> HitResult {
        let delta = end - start;
        let origin = Point::new(start.x, start.y, start.z);

        if delta.length_squared() < KINDA_SMALL_NUMBER * KINDA_SMALL_NUMBER {
            for body in self.candidates(filter) {
                if body.shape.contains_point(&body.isometry(), &origin) {
                    return HitResult {
                        blocking_hit: true,
                        start_penetrating: true,
                        time: 0.0,
                        distance: 0.0,
                        location: start,
                        impact_point: start,
                        body: Some(body.id),
                        contents: body.contents,
                        surface: body.surface,
                        ..HitResult::no_hit(start, end)
                    };
                }
            }
            return HitResult::no_hit(start, end);
        }

        let ray = Ray::new(origin, to_vector(delta));
        let mut closest: Option<(&CollisionBody, f32, Vec3)> = None;

        for body in self.candidates(filter) {
            let Some(intersection) =
                body.shape
                    .cast_ray_and_get_normal(&body.isometry(), &ray, 1.0, true)
            else {
                continue;
            };

            let is_closer = closest
                .as_ref()
                .map_or(true, |(_, t, _)| intersection.time_of_impact < *t);
            if is_closer {
                let normal = from_vector(&intersection.normal);
                closest = Some((body, intersection.time_of_impact, normal));
            }
        }

        let Some((body, time, normal)) = closest else {
            return HitResult::no_hit(start, end);
        };

        let location = start + delta * time;
        let start_penetrating = time <= 0.0 && normal == Vec3::ZERO;
        let (impact_point, impact_normal) = if start_penetrating {
            (location, Vec3::ZERO)
        } else {
            body.face_normal(location, delta, safe_normal(normal))
        };

        HitResult {
            blocking_hit: true,
            start_penetrating,
            time,
            distance: delta.length() * time,
            location,
            impact_point,
            normal: impact_normal,
            impact_normal,
            trace_start: start,
            trace_end: end,
            penetration_depth: 0.0,
            body: Some(body.id),
            contents: body.contents,
            surface: body.surface,
        }
    }

    fn body_blocks(&self, body: BodyId, mask: ContentFlags) -> bool {
        self.body(body)
            .is_some_and(|b| b.collision_enabled && mask.intersects(b.contents))
    }
}

impl MovementBaseTracker for CollisionWorld {
    fn base_transform(&self, base: BodyId) -> Option<BaseTransform> {
        self.body(base).map(|b| BaseTransform {
            location: b.location,
            rotation: b.rotation,
        })
    }

    fn base_velocity(&self, base: BodyId) -> Vec3 {
        self.body(base).map_or(Vec3::ZERO, |b| b.linear_velocity)
    }

    fn base_angular_velocity(&self, base: BodyId) -> Vec3 {
        self.body(base).map_or(Vec3::ZERO, |b| b.angular_velocity)
    }

    fn is_dynamic_base(&self, base: BodyId) -> bool {
        self.body(base).is_some_and(|b| b.dynamic)
    }
}

/// Blocking start-penetrating hit if `capsule` at `iso` overlaps `body`.
fn penetration_hit(
    iso: &Isometry<Real>,
    capsule: &Capsule,
    body: &CollisionBody,
    location: Vec3,
) -> Option<HitResult> {
    let contact = query::contact(iso, capsule, &body.isometry(), body.shape.as_ref(), 0.0)
        .ok()
        .flatten()?;
    if contact.dist >= -CONTACT_TOLERANCE {
        return None;
    }

    let push_out = safe_normal(-from_vector(&contact.normal1.into_inner()));
    Some(HitResult {
        blocking_hit: true,
        start_penetrating: true,
        time: 0.0,
        distance: 0.0,
        location,
        impact_point: from_point(&contact.point2),
        normal: push_out,
        impact_normal: push_out,
        trace_start: location,
        trace_end: location,
        penetration_depth: -contact.dist,
        body: Some(body.id),
        contents: body.contents,
        surface: body.surface,
    })
}

/// Whether `delta` pushes a capsule touching `body` at `iso` into it.
fn moves_into_contact(iso: &Isometry<Real>, capsule: &Capsule, body: &CollisionBody, delta: Vec3) -> bool {
    let contact = query::contact(iso, capsule, &body.isometry(), body.shape.as_ref(), CONTACT_TOLERANCE)
        .ok()
        .flatten();
    let Some(contact) = contact else {
        return false;
    };
    let toward_body = from_vector(&contact.normal1.into_inner());
    toward_body.dot(safe_normal(delta)) > CONTACT_TOLERANCE
}

#[inline]
fn to_isometry(location: Vec3, rotation: Quat) -> Isometry<Real> {
    Isometry::from_parts(
        Translation3::new(location.x, location.y, location.z),
        UnitQuaternion::new_normalize(Quaternion::new(rotation.w, rotation.x, rotation.y, rotation.z)),
    )
}

#[inline]
fn to_vector(v: Vec3) -> Vector<Real> {
    Vector::new(v.x, v.y, v.z)
}

#[inline]
fn from_vector(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

#[inline]
fn from_point(p: &Point<Real>) -> Vec3 {
    Vec3::new(p.x, p.y, p.z)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const CAPSULE: CapsuleShape = CapsuleShape {
        radius: 34.0,
        half_height: 88.0,
    };

    fn create_test_world() -> CollisionWorld {
        let mut world = CollisionWorld::new();

        // Floor with its top face at z=0
        world.add_box(
            Vec3::new(0.0, 0.0, -50.0),
            Vec3::new(5000.0, 5000.0, 50.0),
            ContentFlags::SOLID,
        );

        // Wall with its near face at x=500
        world.add_box(
            Vec3::new(550.0, 0.0, 200.0),
            Vec3::new(50.0, 500.0, 200.0),
            ContentFlags::SOLID,
        );

        world
    }

    #[test]
    fn test_line_trace_hit() {
        let world = create_test_world();

        let hit = world.line_trace(
            Vec3::new(0.0, 0.0, 100.0),
            Vec3::new(1000.0, 0.0, 100.0),
            QueryFilter::new(ContentFlags::SOLID),
        );

        assert!(hit.is_valid_blocking_hit());
        assert!((hit.location.x - 500.0).abs() < 0.1, "Should hit wall at x=500, got {}", hit.location.x);
        assert!(hit.impact_normal.dot(Vec3::NEG_X) > 0.99);
    }

    #[test]
    fn test_line_trace_miss() {
        let world = create_test_world();

        let hit = world.line_trace(
            Vec3::new(0.0, 0.0, 100.0),
            Vec3::new(-1000.0, 0.0, 100.0),
            QueryFilter::new(ContentFlags::SOLID),
        );

        assert!(!hit.blocking_hit);
        assert_eq!(hit.time, 1.0);
    }

    #[test]
    fn test_sweep_capsule_down_onto_floor() {
        let world = create_test_world();

        let start = Vec3::new(0.0, 0.0, 200.0);
        let hit = world.sweep_capsule(
            start,
            Vec3::new(0.0, 0.0, 0.0),
            Quat::IDENTITY,
            CAPSULE,
            QueryFilter::default(),
        );

        assert!(hit.is_valid_blocking_hit());
        assert!((hit.location.z - 88.0).abs() < 0.05, "Capsule should rest on the floor, got {}", hit.location.z);
        assert!(hit.impact_normal.dot(Vec3::Z) > 0.99);
        assert!(hit.impact_point.z.abs() < 0.05);
    }

    #[test]
    fn test_sweep_capsule_into_wall() {
        let world = create_test_world();

        let start = Vec3::new(0.0, 0.0, 100.0);
        let hit = world.sweep_capsule(
            start,
            Vec3::new(1000.0, 0.0, 100.0),
            Quat::IDENTITY,
            CAPSULE,
            QueryFilter::default(),
        );

        assert!(hit.is_valid_blocking_hit());
        assert!((hit.location.x - 466.0).abs() < 0.05, "Should stop one radius before the wall, got {}", hit.location.x);
        assert!(hit.normal.dot(Vec3::NEG_X) > 0.99);
    }

    #[test]
    fn test_sweep_edge_reports_opposing_face() {
        let mut world = CollisionWorld::new();
        // Ledge top at z=40, near face at x=0
        world.add_box(
            Vec3::new(100.0, 0.0, 20.0),
            Vec3::new(100.0, 100.0, 20.0),
            ContentFlags::SOLID,
        );

        // Sweep down so the capsule rim lands on the x=0 edge
        let hit = world.sweep_capsule(
            Vec3::new(-20.0, 0.0, 200.0),
            Vec3::new(-20.0, 0.0, 0.0),
            Quat::IDENTITY,
            CAPSULE,
            QueryFilter::default(),
        );

        assert!(hit.is_valid_blocking_hit());
        assert!(hit.impact_normal.dot(Vec3::Z) > 0.99, "Downward sweep should report the top face, got {}", hit.impact_normal);
        assert!(hit.normal.z < 0.99, "Shape normal should be tilted on an edge");
    }

    #[test]
    fn test_sweep_starting_in_penetration() {
        let world = create_test_world();

        let hit = world.sweep_capsule(
            Vec3::new(0.0, 0.0, 80.0),
            Vec3::new(100.0, 0.0, 80.0),
            Quat::IDENTITY,
            CAPSULE,
            QueryFilter::default(),
        );

        assert!(hit.blocking_hit);
        assert!(hit.start_penetrating);
        assert!(hit.penetration_depth > 7.0, "Expected ~8 units of overlap, got {}", hit.penetration_depth);
        assert!(hit.normal.dot(Vec3::Z) > 0.99, "Push-out should be up, got {}", hit.normal);
    }

    #[test]
    fn test_content_mask_filtering() {
        let mut world = CollisionWorld::new();

        world.add_box(
            Vec3::new(500.0, 0.0, 0.0),
            Vec3::new(50.0, 500.0, 500.0),
            ContentFlags::SOLID,
        );
        let water = world.add_box(
            Vec3::new(200.0, 0.0, 0.0),
            Vec3::new(50.0, 500.0, 500.0),
            ContentFlags::WATER,
        );

        let hit = world.line_trace(Vec3::ZERO, Vec3::new(1000.0, 0.0, 0.0), QueryFilter::new(ContentFlags::SOLID));
        assert!((hit.location.x - 450.0).abs() < 0.1);

        let hit = world.line_trace(Vec3::ZERO, Vec3::new(1000.0, 0.0, 0.0), QueryFilter::new(ContentFlags::WATER));
        assert_eq!(hit.body, Some(water));

        let inside = world.line_trace(
            Vec3::new(200.0, 0.0, 0.0),
            Vec3::new(200.0, 0.0, 0.0),
            QueryFilter::new(ContentFlags::WATER),
        );
        assert!(inside.start_penetrating);
    }

    #[test]
    fn test_ignored_and_disabled_bodies() {
        let mut world = CollisionWorld::new();
        let wall = world.add_box(
            Vec3::new(500.0, 0.0, 0.0),
            Vec3::new(50.0, 500.0, 500.0),
            ContentFlags::SOLID,
        );

        let ignoring = QueryFilter::ignoring(ContentFlags::SOLID, Some(wall));
        assert!(!world.line_trace(Vec3::ZERO, Vec3::new(1000.0, 0.0, 0.0), ignoring).blocking_hit);

        world.set_collision_enabled(wall, false);
        assert!(!world.body_blocks(wall, ContentFlags::SOLID));
        assert!(!world
            .line_trace(Vec3::ZERO, Vec3::new(1000.0, 0.0, 0.0), QueryFilter::new(ContentFlags::SOLID))
            .blocking_hit);
    }

    #[test]
    fn test_move_body_tracks_velocity() {
        let mut world = CollisionWorld::new();
        let platform = world.add_box(Vec3::ZERO, Vec3::splat(100.0), ContentFlags::SOLID);
        assert!(!world.is_dynamic_base(platform));

        world.move_body(platform, Vec3::new(10.0, 0.0, 0.0), Quat::IDENTITY, 0.1);

        assert!(world.is_dynamic_base(platform));
        assert!((world.base_velocity(platform) - Vec3::new(100.0, 0.0, 0.0)).length() < 1e-3);
        let transform = world.base_transform(platform).unwrap();
        assert_eq!(transform.location, Vec3::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn test_plane_and_ball() {
        let mut world = CollisionWorld::new();
        world.add_plane(Vec3::ZERO, Vec3::Z, ContentFlags::SOLID);
        world.add_ball(Vec3::new(0.0, 0.0, 1000.0), 100.0, ContentFlags::SOLID);

        let down = world.line_trace(
            Vec3::new(0.0, 0.0, 500.0),
            Vec3::new(0.0, 0.0, -500.0),
            QueryFilter::new(ContentFlags::SOLID),
        );
        assert!(down.impact_point.z.abs() < 0.01);

        let up = world.line_trace(
            Vec3::new(0.0, 0.0, 500.0),
            Vec3::new(0.0, 0.0, 1500.0),
            QueryFilter::new(ContentFlags::SOLID),
        );
        assert!((up.impact_point.z - 900.0).abs() < 0.01);
        assert!(up.impact_normal.dot(Vec3::NEG_Z) > 0.99);
    }

    #[test]
    fn test_sweep_from_resting_contact() {
        let mut world = CollisionWorld::new();
        world.add_plane(Vec3::ZERO, Vec3::Z, ContentFlags::SOLID);
        let filter = QueryFilter::new(ContentFlags::SOLID);
        // Capsule bottom exactly on the plane.
        let resting = Vec3::new(0.0, 0.0, 88.0);

        let up = world.sweep_capsule(resting, resting + Vec3::Z * 2.0, Quat::IDENTITY, CAPSULE, filter);
        assert!(!up.blocking_hit, "Lifting off a touched plane should be free");

        let along = world.sweep_capsule(resting, resting + Vec3::X * 50.0, Quat::IDENTITY, CAPSULE, filter);
        assert!(!along.blocking_hit, "Sliding along a touched plane should be free");

        let down = world.sweep_capsule(resting, resting - Vec3::Z * 2.0, Quat::IDENTITY, CAPSULE, filter);
        assert!(down.is_valid_blocking_hit());
        assert!(!down.start_penetrating);
        assert!(down.time < 1e-3);
    }
}
