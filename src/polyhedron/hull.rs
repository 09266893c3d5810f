//! Incremental hull construction: adding a point to a polyhedron in any of
//! its degenerate states.
//!
//! The brush-level operations never add points to a polyhedron that carries
//! face payloads; they build candidate geometries from scratch and inspect
//! the result. That frees this module to rebuild topology wholesale (via
//! [`Polyhedron::weave`]) instead of performing in-place surgery.

use glam::DVec3;

use crate::math::{EPSILON, almost_equal_vec};
use crate::plane::{Plane, PointStatus};
use crate::polyhedron::{FaceIdx, HalfEdgeIdx, NoopCallback, Polyhedron};

impl Polyhedron {
    /// Builds the convex hull of a point set by incremental insertion.
    #[must_use]
    pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Self {
        let mut poly = Self::new();
        for point in points {
            poly.add_point(point);
        }
        poly
    }

    /// Adds a point to the hull.
    ///
    /// Returns `true` if the point extended the hull, `false` if it lies
    /// inside (or within [`EPSILON`] of an existing vertex) and the
    /// polyhedron is unchanged.
    pub fn add_point(&mut self, point: DVec3) -> bool {
        if self.empty() {
            self.alloc_vertex(point);
            return true;
        }
        if self.point() {
            return self.add_second_point(point);
        }
        if self.edge_state() {
            return self.add_third_point(point);
        }
        if self.polygon() {
            return self.add_point_to_polygon(point);
        }
        self.add_point_to_polyhedron(point)
    }

    fn add_second_point(&mut self, point: DVec3) -> bool {
        let existing = self
            .vertex_indices()
            .next()
            .expect("point state has a vertex");
        if almost_equal_vec(self.position(existing), point) {
            return false;
        }

        let added = self.alloc_vertex(point);
        let h = self.alloc_half_edge(existing);
        let t = self.alloc_half_edge(added);
        let edge = self.alloc_edge(h, t);
        {
            let half = self.half_edge_mut(h);
            half.twin = t;
            half.next = t;
            half.edge = edge;
        }
        {
            let half = self.half_edge_mut(t);
            half.twin = h;
            half.next = h;
            half.edge = edge;
        }
        self.vertex_mut(existing).leaving = Some(h);
        self.vertex_mut(added).leaving = Some(t);
        true
    }

    fn add_third_point(&mut self, point: DVec3) -> bool {
        let (va, vb) = {
            let mut ids = self.vertex_indices();
            let va = ids.next().expect("edge state has two vertices");
            let vb = ids.next().expect("edge state has two vertices");
            (va, vb)
        };
        let a = self.position(va);
        let b = self.position(vb);
        if almost_equal_vec(a, point) || almost_equal_vec(b, point) {
            return false;
        }

        let direction = b - a;
        if direction.cross(point - a).length_squared() < EPSILON * EPSILON {
            // Collinear: either inside the segment or an extension.
            let t = (point - a).dot(direction) / direction.length_squared();
            if t < 0.0 {
                self.vertex_mut(va).position = point;
            } else if t > 1.0 {
                self.vertex_mut(vb).position = point;
            } else {
                return false;
            }
            return true;
        }

        let plane = Plane::from_points(a, b, point).expect("points checked non-collinear");
        *self = Self::weave(vec![(plane, vec![a, b, point])]);
        true
    }

    fn add_point_to_polygon(&mut self, point: DVec3) -> bool {
        let face = self.face_indices().next().expect("polygon state has a face");
        let plane = self.face(face).plane;
        match plane.point_status(point) {
            PointStatus::On => self.extend_coplanar_polygon(face, point),
            PointStatus::Above => self.raise_pyramid(face, point, true),
            PointStatus::Below => self.raise_pyramid(face, point, false),
        }
    }

    /// Coplanar insertion: recompute the 2D convex hull of the boundary
    /// loop plus the new point.
    fn extend_coplanar_polygon(&mut self, face: FaceIdx, point: DVec3) -> bool {
        let plane = self.face(face).plane;
        let mut candidates = self.face_vertex_positions(face);
        if candidates
            .iter()
            .any(|&existing| almost_equal_vec(existing, point))
        {
            return false;
        }
        candidates.push(point);

        let hull = convex_hull_2d(&candidates, &plane);
        if !hull.contains(&(candidates.len() - 1)) {
            return false;
        }

        let positions: Vec<DVec3> = hull.into_iter().map(|i| candidates[i]).collect();
        *self = Self::weave(vec![(plane, positions)]);
        true
    }

    /// Off-plane insertion turns the polygon into a pyramid. The base loop
    /// must wind so its normal faces away from the apex.
    fn raise_pyramid(&mut self, face: FaceIdx, apex: DVec3, apex_above: bool) -> bool {
        let mut base = self.face_vertex_positions(face);
        let mut base_plane = self.face(face).plane;
        if apex_above {
            base.reverse();
            base_plane = base_plane.flipped();
        }

        let mut faces = vec![(base_plane, base.clone())];
        let n = base.len();
        for i in 0..n {
            let a = base[i];
            let b = base[(i + 1) % n];
            // Side faces traverse the shared edge opposite to the base.
            let Some(side_plane) = Plane::from_points(b, a, apex) else {
                return false;
            };
            faces.push((side_plane, vec![b, a, apex]));
        }

        *self = Self::weave(faces);
        self.merge_coplanar_faces(&mut NoopCallback);
        true
    }

    /// Full 3D case: delete the faces that see the point, close the horizon
    /// with a triangle fan, and re-stitch.
    fn add_point_to_polyhedron(&mut self, point: DVec3) -> bool {
        let visible: Vec<FaceIdx> = self
            .face_indices()
            .filter(|&f| self.face(f).plane.point_status(point) == PointStatus::Above)
            .collect();
        if visible.is_empty() {
            return false;
        }

        let is_visible = |f: Option<FaceIdx>| f.is_some_and(|f| visible.contains(&f));

        let mut faces = Vec::new();
        for face in self.face_indices() {
            if visible.contains(&face) {
                continue;
            }
            faces.push((self.face(face).plane, self.face_vertex_positions(face)));

            // Horizon half-edges of this kept face spawn fan triangles.
            for h in self.face_half_edges(face) {
                let twin: HalfEdgeIdx = self.half_edge(h).twin;
                if is_visible(self.half_edge(twin).face) {
                    let a = self.position(self.half_edge(h).origin);
                    let b = self.position(self.destination(h));
                    let Some(side_plane) = Plane::from_points(b, a, point) else {
                        return false;
                    };
                    faces.push((side_plane, vec![b, a, point]));
                }
            }
        }

        *self = Self::weave(faces);
        self.merge_coplanar_faces(&mut NoopCallback);
        true
    }
}

/// Monotone-chain convex hull in the plane's tangent coordinates.
///
/// Returns indices into `points` in counter-clockwise order as seen from
/// the plane's normal side. Collinear boundary points are dropped, keeping
/// the loop strictly convex.
fn convex_hull_2d(points: &[DVec3], plane: &Plane) -> Vec<usize> {
    let (u, v) = plane.tangent_vectors();
    let origin = points[0];
    let projected: Vec<(f64, f64)> = points
        .iter()
        .map(|&p| ((p - origin).dot(u), (p - origin).dot(v)))
        .collect();

    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&i, &j| {
        projected[i]
            .0
            .total_cmp(&projected[j].0)
            .then(projected[i].1.total_cmp(&projected[j].1))
    });

    let cross = |o: usize, a: usize, b: usize| {
        let (ox, oy) = projected[o];
        let (ax, ay) = projected[a];
        let (bx, by) = projected[b];
        (ax - ox) * (by - oy) - (ay - oy) * (bx - ox)
    };

    let mut lower: Vec<usize> = Vec::new();
    for &i in &order {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], i) <= EPSILON
        {
            lower.pop();
        }
        lower.push(i);
    }

    let mut upper: Vec<usize> = Vec::new();
    for &i in order.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], i) <= EPSILON
        {
            upper.pop();
        }
        upper.push(i);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}
