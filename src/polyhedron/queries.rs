//! Geometric queries: containment, intersection and position-based lookup
//! of vertices, edges and faces.
//!
//! Brush operations identify topological elements by *position*, not by
//! index: an edit rebuilds geometry, and the edited element is found again
//! in the result by where it ended up. The `find_closest_*` and `has_*`
//! queries are that lookup.

use glam::DVec3;
use itertools::Itertools;

use crate::bbox::BoundingBox;
use crate::math::{EPSILON, Polygon3, Segment3, cyclic_distance, cyclic_match};
use crate::plane::PointStatus;
use crate::polyhedron::{EdgeIdx, FaceIdx, Polyhedron, VertexIdx};

impl Polyhedron {
    /// Returns `true` if the point is inside or on the boundary.
    #[must_use]
    pub fn contains_point(&self, point: DVec3) -> bool {
        self.face_indices()
            .all(|f| self.face(f).plane.point_status(point) != PointStatus::Above)
    }

    /// Returns `true` if the whole box is inside this polyhedron.
    #[must_use]
    pub fn contains_bbox(&self, bbox: &BoundingBox) -> bool {
        bbox.vertices().into_iter().all(|p| self.contains_point(p))
    }

    /// Returns `true` if every vertex of `other` is inside this polyhedron.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        other
            .vertex_positions()
            .into_iter()
            .all(|p| self.contains_point(p))
    }

    /// Convex intersection test by separating axes: face normals of both
    /// solids plus cross products of edge directions.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        if self.empty() || other.empty() {
            return false;
        }
        if !self.bounds().intersects(&other.bounds()) {
            return false;
        }

        let mine = self.vertex_positions();
        let theirs = other.vertex_positions();

        let mut axes: Vec<DVec3> = Vec::new();
        axes.extend(self.face_indices().map(|f| self.face(f).plane.normal));
        axes.extend(other.face_indices().map(|f| other.face(f).plane.normal));

        let edge_directions = |poly: &Self| -> Vec<DVec3> {
            poly.edge_indices()
                .map(|e| {
                    let s = poly.edge_segment(e);
                    s.end - s.start
                })
                .collect()
        };
        axes.extend(
            edge_directions(self)
                .into_iter()
                .cartesian_product(edge_directions(other))
                .map(|(d1, d2)| d1.cross(d2))
                .filter(|axis| axis.length_squared() > EPSILON * EPSILON)
                .map(DVec3::normalize),
        );

        !axes.iter().any(|&axis| separated(&mine, &theirs, axis))
    }

    /// The vertex closest to `position` within `max_distance`.
    #[must_use]
    pub fn find_closest_vertex(&self, position: DVec3, max_distance: f64) -> Option<VertexIdx> {
        self.vertex_indices()
            .map(|v| (v, (self.position(v) - position).length()))
            .filter(|&(_, d)| d <= max_distance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(v, _)| v)
    }

    /// The edge whose endpoints best match the segment (in either order)
    /// within `max_distance` total deviation.
    #[must_use]
    pub fn find_closest_edge(&self, segment: &Segment3, max_distance: f64) -> Option<EdgeIdx> {
        self.edge_indices()
            .map(|e| {
                let s = self.edge_segment(e);
                let forward =
                    (s.start - segment.start).length() + (s.end - segment.end).length();
                let backward =
                    (s.start - segment.end).length() + (s.end - segment.start).length();
                (e, forward.min(backward))
            })
            .filter(|&(_, d)| d <= max_distance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(e, _)| e)
    }

    /// The face whose boundary loop best matches the polygon (up to cyclic
    /// rotation) within `max_distance` total deviation.
    #[must_use]
    pub fn find_closest_face(&self, polygon: &Polygon3, max_distance: f64) -> Option<FaceIdx> {
        self.face_indices()
            .filter_map(|f| {
                cyclic_distance(&self.face_vertex_positions(f), polygon.vertices())
                    .map(|d| (f, d))
            })
            .filter(|&(_, d)| d <= max_distance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(f, _)| f)
    }

    /// Returns `true` if some vertex lies at `position`.
    #[must_use]
    pub fn has_vertex(&self, position: DVec3) -> bool {
        self.find_closest_vertex(position, EPSILON).is_some()
    }

    /// Returns `true` if some edge connects the segment's endpoints.
    #[must_use]
    pub fn has_edge(&self, segment: &Segment3) -> bool {
        self.find_closest_edge(segment, EPSILON).is_some()
    }

    /// Returns `true` if some face has exactly the polygon's boundary.
    #[must_use]
    pub fn has_face(&self, polygon: &Polygon3) -> bool {
        self.face_indices().any(|f| {
            cyclic_match(
                &self.face_vertex_positions(f),
                polygon.vertices(),
                EPSILON,
            )
        })
    }

    /// Intersects a ray with a face hit from the inside (the ray direction
    /// runs with the outward normal). Returns the ray parameter of the hit,
    /// or `None` if the ray misses the face or approaches from outside.
    #[must_use]
    pub fn intersect_face_with_ray(
        &self,
        face: FaceIdx,
        origin: DVec3,
        direction: DVec3,
    ) -> Option<f64> {
        let plane = self.face(face).plane;
        let denom = plane.normal.dot(direction);
        if denom <= EPSILON {
            return None;
        }
        let t = -plane.signed_distance(origin) / denom;
        if t < 0.0 {
            return None;
        }
        let hit = origin + direction * t;

        let positions = self.face_vertex_positions(face);
        let n = positions.len();
        let inside = (0..n).all(|i| {
            let a = positions[i];
            let b = positions[(i + 1) % n];
            (b - a).cross(hit - a).dot(plane.normal) >= -EPSILON
        });
        inside.then_some(t)
    }
}

fn separated(a: &[DVec3], b: &[DVec3], axis: DVec3) -> bool {
    let project = |points: &[DVec3]| {
        points.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            let d = p.dot(axis);
            (lo.min(d), hi.max(d))
        })
    };
    let (a_lo, a_hi) = project(a);
    let (b_lo, b_hi) = project(b);
    a_hi < b_lo - EPSILON || b_hi < a_lo - EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BoundingBox;

    #[test]
    fn test_contains_point() {
        let cube = Polyhedron::cuboid(&BoundingBox::cube(32.0));
        assert!(cube.contains_point(DVec3::ZERO));
        assert!(cube.contains_point(DVec3::splat(32.0)));
        assert!(!cube.contains_point(DVec3::new(33.0, 0.0, 0.0)));
    }

    #[test]
    fn test_contains_polyhedron() {
        let outer = Polyhedron::cuboid(&BoundingBox::cube(32.0));
        let inner = Polyhedron::cuboid(&BoundingBox::cube(16.0));
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert!(outer.contains_bbox(&BoundingBox::cube(16.0)));
        assert!(!outer.contains_bbox(&BoundingBox::cube(48.0)));
    }

    #[test]
    fn test_intersects_overlapping_and_disjoint() {
        let a = Polyhedron::cuboid(&BoundingBox::cube(32.0));
        let b = Polyhedron::cuboid(&BoundingBox::new(
            DVec3::splat(16.0),
            DVec3::splat(64.0),
        ));
        let c = Polyhedron::cuboid(&BoundingBox::new(
            DVec3::splat(64.5),
            DVec3::splat(96.0),
        ));
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_intersects_needs_edge_cross_axis() {
        // Two cubes rotated 45 degrees against each other near a corner:
        // face-normal axes alone cannot separate them.
        let a = Polyhedron::cuboid(&BoundingBox::cube(16.0));
        let mut b = Polyhedron::cuboid(&BoundingBox::cube(16.0));
        b.transform(&glam::DMat4::from_rotation_z(std::f64::consts::FRAC_PI_4));
        b.transform(&glam::DMat4::from_translation(DVec3::new(40.0, 0.0, 0.0)));
        assert!(!a.intersects(&b));

        let mut c = Polyhedron::cuboid(&BoundingBox::cube(16.0));
        c.transform(&glam::DMat4::from_rotation_z(std::f64::consts::FRAC_PI_4));
        c.transform(&glam::DMat4::from_translation(DVec3::new(30.0, 0.0, 0.0)));
        assert!(a.intersects(&c));
    }

    #[test]
    fn test_find_elements_by_position() {
        let cube = Polyhedron::cuboid(&BoundingBox::cube(32.0));
        let corner = DVec3::splat(32.0);

        assert!(cube.has_vertex(corner));
        assert!(!cube.has_vertex(DVec3::splat(31.0)));
        assert!(cube.find_closest_vertex(DVec3::splat(30.0), 4.0).is_some());
        assert!(cube.find_closest_vertex(DVec3::splat(30.0), 1.0).is_none());

        let edge = Segment3::new(corner, DVec3::new(32.0, 32.0, -32.0));
        assert!(cube.has_edge(&edge));
        // Endpoint order must not matter.
        assert!(cube.has_edge(&Segment3::new(edge.end, edge.start)));
        assert!(!cube.has_edge(&Segment3::new(corner, DVec3::ZERO)));
    }

    #[test]
    fn test_has_face_up_to_rotation() {
        let cube = Polyhedron::cuboid(&BoundingBox::cube(32.0));
        let top = cube
            .face_indices()
            .find(|&f| cube.face(f).plane.normal.z > 0.9)
            .expect("cube has a top face");
        let mut positions = cube.face_vertex_positions(top);
        positions.rotate_left(2);
        assert!(cube.has_face(&Polygon3::new(positions.clone())));

        // Reversed winding describes the face of a different solid.
        positions.reverse();
        assert!(!cube.has_face(&Polygon3::new(positions)));
    }

    #[test]
    fn test_ray_face_intersection() {
        let cube = Polyhedron::cuboid(&BoundingBox::cube(32.0));
        let top = cube
            .face_indices()
            .find(|&f| cube.face(f).plane.normal.z > 0.9)
            .expect("cube has a top face");

        // From inside straight up: hits the top face at t = 32.
        let t = cube
            .intersect_face_with_ray(top, DVec3::ZERO, DVec3::Z)
            .expect("ray hits top face");
        assert!((t - 32.0).abs() < EPSILON);

        // Parallel or outward-approaching rays miss.
        assert!(cube.intersect_face_with_ray(top, DVec3::ZERO, DVec3::X).is_none());
        assert!(cube.intersect_face_with_ray(top, DVec3::ZERO, -DVec3::Z).is_none());
        // Pointing up but displaced beyond the face boundary.
        assert!(
            cube.intersect_face_with_ray(top, DVec3::new(100.0, 0.0, 0.0), DVec3::Z)
                .is_none()
        );
    }
}
