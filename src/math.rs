//! Shared numeric policy and small geometric value types.
//!
//! Every tolerance-based comparison in the crate funnels through the
//! constants and helpers defined here, so the vertex-uniqueness invariant
//! has a single epsilon authority.

use glam::{DMat4, DVec3};

/// Crate-wide tolerance for position and plane-distance comparisons.
pub const EPSILON: f64 = 1e-7;

/// Coarser tolerance used when snapping vertex coordinates to integers
/// after a batch of clips, to keep numerical drift from accumulating.
pub const CORRECT_EPSILON: f64 = 1e-3;

/// Edges shorter than this are collapsed during healing.
pub const MIN_EDGE_LENGTH: f64 = 1e-3;

/// Scalar comparison under the crate epsilon.
#[inline]
#[must_use]
pub fn almost_zero(v: f64) -> bool {
    v.abs() < EPSILON
}

/// Scalar equality under the crate epsilon.
#[inline]
#[must_use]
pub fn almost_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

/// Position equality: Euclidean distance under the crate epsilon.
#[inline]
#[must_use]
pub fn almost_equal_vec(a: DVec3, b: DVec3) -> bool {
    (a - b).length_squared() < EPSILON * EPSILON
}

/// Returns `true` if the vector is the zero vector under the crate epsilon.
#[inline]
#[must_use]
pub fn almost_zero_vec(v: DVec3) -> bool {
    v.length_squared() < EPSILON * EPSILON
}

/// Returns `true` if every element of the matrix is finite.
#[must_use]
pub fn is_finite_mat(m: &DMat4) -> bool {
    [m.x_axis, m.y_axis, m.z_axis, m.w_axis]
        .iter()
        .all(|axis| axis.is_finite())
}

/// Solves the affine transform mapping three reference points onto three
/// image points.
///
/// The third independent direction is taken along the plane normal of each
/// triple, so the transform is fully determined. Returns `None` when either
/// triple is (nearly) collinear or the system is singular.
#[must_use]
pub fn points_transformation_matrix(from: [DVec3; 3], to: [DVec3; 3]) -> Option<DMat4> {
    let u0 = from[1] - from[0];
    let v0 = from[2] - from[0];
    let n0 = u0.cross(v0);
    if n0.length_squared() < EPSILON * EPSILON {
        return None;
    }

    let u1 = to[1] - to[0];
    let v1 = to[2] - to[0];
    let n1 = u1.cross(v1);
    if n1.length_squared() < EPSILON * EPSILON {
        return None;
    }

    let a = glam::DMat3::from_cols(u0, v0, n0.normalize());
    let b = glam::DMat3::from_cols(u1, v1, n1.normalize());
    if almost_zero(a.determinant()) {
        return None;
    }

    let linear = b * a.inverse();
    let m = DMat4::from_translation(to[0])
        * DMat4::from_mat3(linear)
        * DMat4::from_translation(-from[0]);
    is_finite_mat(&m).then_some(m)
}

/// An undirected segment given by its two endpoint positions.
///
/// Used as the position handle for edge-level brush operations: an edge is
/// re-identified after a rebuild by its (possibly translated) endpoints.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment3 {
    pub start: DVec3,
    pub end: DVec3,
}

impl Segment3 {
    #[must_use]
    pub const fn new(start: DVec3, end: DVec3) -> Self {
        Self { start, end }
    }

    /// The segment translated by `delta`.
    #[must_use]
    pub fn translated(&self, delta: DVec3) -> Self {
        Self::new(self.start + delta, self.end + delta)
    }
}

/// A planar polygon given by its vertex positions in loop order.
///
/// The position handle for face-level brush operations, compared up to
/// cyclic rotation.
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon3 {
    vertices: Vec<DVec3>,
}

impl Polygon3 {
    #[must_use]
    pub fn new(vertices: Vec<DVec3>) -> Self {
        Self { vertices }
    }

    #[must_use]
    pub fn vertices(&self) -> &[DVec3] {
        &self.vertices
    }

    /// The polygon translated by `delta`.
    #[must_use]
    pub fn translated(&self, delta: DVec3) -> Self {
        Self::new(self.vertices.iter().map(|&v| v + delta).collect())
    }
}

/// Collects the distinct endpoint positions of a set of segments.
#[must_use]
pub fn segment_vertices(segments: &[Segment3]) -> Vec<DVec3> {
    let mut result = Vec::with_capacity(segments.len() * 2);
    for segment in segments {
        push_unique(&mut result, segment.start);
        push_unique(&mut result, segment.end);
    }
    result
}

/// Collects the distinct vertex positions of a set of polygons.
#[must_use]
pub fn polygon_vertices(polygons: &[Polygon3]) -> Vec<DVec3> {
    let mut result = Vec::new();
    for polygon in polygons {
        for &v in polygon.vertices() {
            push_unique(&mut result, v);
        }
    }
    result
}

fn push_unique(positions: &mut Vec<DVec3>, p: DVec3) {
    if !positions.iter().any(|&q| almost_equal_vec(p, q)) {
        positions.push(p);
    }
}

/// Compares two vertex loops up to cyclic rotation, without reversal.
///
/// Winding is an invariant of the kernel (outward-facing, right-hand rule),
/// so two loops describing the same face always agree in direction.
#[must_use]
pub fn cyclic_match(a: &[DVec3], b: &[DVec3], epsilon: f64) -> bool {
    if a.len() != b.len() || a.is_empty() {
        return a.len() == b.len();
    }
    let n = a.len();
    (0..n).any(|offset| {
        (0..n).all(|i| (a[i] - b[(i + offset) % n]).length_squared() < epsilon * epsilon)
    })
}

/// Total distance between two vertex loops at their best cyclic alignment,
/// or `None` if the loops have different lengths.
#[must_use]
pub fn cyclic_distance(a: &[DVec3], b: &[DVec3]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let n = a.len();
    (0..n)
        .map(|offset| {
            (0..n)
                .map(|i| (a[i] - b[(i + offset) % n]).length())
                .sum::<f64>()
        })
        .min_by(f64::total_cmp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_almost_equal_vec() {
        let a = DVec3::new(1.0, 2.0, 3.0);
        assert!(almost_equal_vec(a, a + DVec3::splat(1e-9)));
        assert!(!almost_equal_vec(a, a + DVec3::new(1e-3, 0.0, 0.0)));
    }

    #[test]
    fn test_is_finite_mat() {
        assert!(is_finite_mat(&DMat4::IDENTITY));
        let mut m = DMat4::IDENTITY;
        m.w_axis.x = f64::NAN;
        assert!(!is_finite_mat(&m));
    }

    #[test]
    fn test_points_transformation_translation() {
        let from = [DVec3::ZERO, DVec3::X, DVec3::Y];
        let delta = DVec3::new(3.0, -2.0, 5.0);
        let to = [from[0] + delta, from[1] + delta, from[2] + delta];

        let m = points_transformation_matrix(from, to).unwrap();
        let p = DVec3::new(7.0, 11.0, -4.0);
        assert_relative_eq!(
            m.transform_point3(p).x,
            (p + delta).x,
            epsilon = 1e-9
        );
        assert!(almost_equal_vec(m.transform_point3(p), p + delta));
    }

    #[test]
    fn test_points_transformation_rejects_collinear() {
        let from = [DVec3::ZERO, DVec3::X, DVec3::X * 2.0];
        let to = [DVec3::ZERO, DVec3::Y, DVec3::Y * 2.0];
        assert!(points_transformation_matrix(from, to).is_none());
    }

    #[test]
    fn test_cyclic_match_rotations() {
        let a = vec![DVec3::ZERO, DVec3::X, DVec3::Y];
        let b = vec![DVec3::Y, DVec3::ZERO, DVec3::X];
        assert!(cyclic_match(&a, &b, EPSILON));

        let c = vec![DVec3::ZERO, DVec3::Y, DVec3::X];
        assert!(!cyclic_match(&a, &c, EPSILON));
    }

    #[test]
    fn test_segment_vertices_dedup() {
        let segments = [
            Segment3::new(DVec3::ZERO, DVec3::X),
            Segment3::new(DVec3::X, DVec3::Y),
        ];
        assert_eq!(segment_vertices(&segments).len(), 3);
    }
}
