//! The plane / half-space primitive: `n · x = d` with unit normal `n`.
//!
//! Points with `n · x > d` are *above* the plane (outside the half-space),
//! points with `n · x < d` are *below* (inside). Every face of a polyhedron
//! carries such a plane with the normal facing outward.

use glam::{DMat3, DMat4, DVec3};

use crate::math::{EPSILON, almost_equal, almost_equal_vec};

/// Classification of a point relative to a plane, within tolerance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointStatus {
    /// Inside the half-space: `n·x < d - ε`.
    Below,
    /// On the plane: `|n·x - d| ≤ ε`.
    On,
    /// Outside the half-space: `n·x > d + ε`.
    Above,
}

/// An oriented plane with unit normal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    /// Unit normal, pointing toward the outside.
    pub normal: DVec3,
    /// Signed distance from the origin along the normal.
    pub offset: f64,
}

impl Plane {
    /// Create a plane, normalizing the input normal.
    ///
    /// # Panics
    /// Panics if the normal has zero length.
    #[must_use]
    pub fn new(normal: DVec3, offset: f64) -> Self {
        let len = normal.length();
        assert!(len > EPSILON, "plane normal must be non-zero");
        Self {
            normal: normal / len,
            offset: offset / len,
        }
    }

    /// Create a plane through `anchor` with the given normal.
    #[must_use]
    pub fn from_point_and_normal(anchor: DVec3, normal: DVec3) -> Self {
        let normal = normal.normalize();
        Self {
            normal,
            offset: normal.dot(anchor),
        }
    }

    /// Create the plane through three points, wound counter-clockwise when
    /// viewed from the normal side (right-hand rule).
    ///
    /// Returns `None` if the points are (nearly) collinear.
    #[must_use]
    pub fn from_points(p0: DVec3, p1: DVec3, p2: DVec3) -> Option<Self> {
        let normal = (p1 - p0).cross(p2 - p0);
        if normal.length_squared() < EPSILON * EPSILON {
            return None;
        }
        Some(Self::from_point_and_normal(p0, normal))
    }

    /// Signed distance: negative below, zero on, positive above.
    #[inline]
    #[must_use]
    pub fn signed_distance(&self, point: DVec3) -> f64 {
        self.normal.dot(point) - self.offset
    }

    /// Classify a point with the given tolerance.
    #[must_use]
    pub fn point_status_eps(&self, point: DVec3, epsilon: f64) -> PointStatus {
        let d = self.signed_distance(point);
        if d < -epsilon {
            PointStatus::Below
        } else if d > epsilon {
            PointStatus::Above
        } else {
            PointStatus::On
        }
    }

    /// Classify a point with the crate tolerance.
    #[inline]
    #[must_use]
    pub fn point_status(&self, point: DVec3) -> PointStatus {
        self.point_status_eps(point, EPSILON)
    }

    /// The same plane with its orientation reversed.
    #[must_use]
    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            offset: -self.offset,
        }
    }

    /// Orthogonal projection of a point onto the plane.
    #[must_use]
    pub fn project_point(&self, point: DVec3) -> DVec3 {
        point - self.signed_distance(point) * self.normal
    }

    /// Plane equality under the crate epsilon (same orientation).
    #[must_use]
    pub fn almost_equal(&self, other: &Self) -> bool {
        almost_equal_vec(self.normal, other.normal) && almost_equal(self.offset, other.offset)
    }

    /// The plane carried through an affine transformation. Normals move by
    /// the inverse-transpose so non-uniform scaling stays correct.
    #[must_use]
    pub fn transformed(&self, matrix: &DMat4) -> Self {
        let anchor = matrix.transform_point3(self.normal * self.offset);
        let normal_matrix = DMat3::from_mat4(matrix.inverse()).transpose();
        Self::from_point_and_normal(anchor, normal_matrix * self.normal)
    }

    /// A pair of unit tangents spanning the plane, right-handed with the
    /// normal: `u × v = n`.
    #[must_use]
    pub fn tangent_vectors(&self) -> (DVec3, DVec3) {
        let arbitrary = if self.normal.x.abs() < 0.9 {
            DVec3::X
        } else {
            DVec3::Y
        };
        let u = self.normal.cross(arbitrary).normalize();
        let v = self.normal.cross(u).normalize();
        (u, v)
    }
}

/// Intersection point of three planes, or `None` if they do not meet in a
/// single point (parallel or near-singular configuration).
#[must_use]
pub fn intersect_three_planes(p1: &Plane, p2: &Plane, p3: &Plane) -> Option<DVec3> {
    let m = DMat3::from_cols(p1.normal, p2.normal, p3.normal).transpose();
    let det = m.determinant();
    if det.abs() < EPSILON {
        return None;
    }
    Some(m.inverse() * DVec3::new(p1.offset, p2.offset, p3.offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_status() {
        let plane = Plane::new(DVec3::X, 1.0);
        assert_eq!(plane.point_status(DVec3::ZERO), PointStatus::Below);
        assert_eq!(plane.point_status(DVec3::X), PointStatus::On);
        assert_eq!(plane.point_status(DVec3::X * 2.0), PointStatus::Above);
    }

    #[test]
    fn test_from_points_winding() {
        // CCW in the XY plane seen from +Z.
        let plane = Plane::from_points(DVec3::ZERO, DVec3::X, DVec3::Y).unwrap();
        assert!(almost_equal_vec(plane.normal, DVec3::Z));
        assert!(almost_equal(plane.offset, 0.0));
    }

    #[test]
    fn test_from_points_collinear() {
        assert!(Plane::from_points(DVec3::ZERO, DVec3::X, DVec3::X * 3.0).is_none());
    }

    #[test]
    fn test_three_plane_intersection() {
        let p1 = Plane::new(DVec3::X, 2.0);
        let p2 = Plane::new(DVec3::Y, 3.0);
        let p3 = Plane::new(DVec3::Z, 4.0);
        let point = intersect_three_planes(&p1, &p2, &p3).unwrap();
        assert!(almost_equal_vec(point, DVec3::new(2.0, 3.0, 4.0)));
    }

    #[test]
    fn test_parallel_planes_no_intersection() {
        let p1 = Plane::new(DVec3::X, 0.0);
        let p2 = Plane::new(DVec3::X, 1.0);
        let p3 = Plane::new(DVec3::Y, 0.0);
        assert!(intersect_three_planes(&p1, &p2, &p3).is_none());
    }

    #[test]
    fn test_transformed_follows_rotation() {
        let plane = Plane::new(DVec3::Z, 8.0);
        let rotated = plane.transformed(&DMat4::from_rotation_x(std::f64::consts::FRAC_PI_2));
        // +Z rotates onto -Y around the x axis.
        assert!(almost_equal_vec(rotated.normal, -DVec3::Y));
        assert!(almost_equal(rotated.offset, 8.0));

        let shifted = plane.transformed(&DMat4::from_translation(DVec3::Z * 4.0));
        assert!(almost_equal_vec(shifted.normal, DVec3::Z));
        assert!(almost_equal(shifted.offset, 12.0));
    }

    #[test]
    fn test_tangent_vectors_right_handed() {
        let plane = Plane::new(DVec3::new(1.0, 2.0, -0.5), 3.0);
        let (u, v) = plane.tangent_vectors();
        assert!(almost_equal_vec(u.cross(v), plane.normal));
    }
}
