//! Boolean subtraction and intersection of convex solids.
//!
//! A convex solid cannot represent `A \ B` directly, so subtraction
//! produces a set of disjoint convex fragments covering it: for each face
//! plane of the subtrahend, the part of the remainder *outside* that plane
//! is carved off as one fragment and the remainder is clipped to the
//! inside. What is left at the end lies inside the subtrahend and is
//! discarded.

use tracing::trace;

use crate::polyhedron::{ClipResult, NoopCallback, Polyhedron};

impl Polyhedron {
    /// Carves `other` out of this polyhedron, returning disjoint convex
    /// fragments that exactly cover `self \ other`.
    ///
    /// If the solids do not intersect the result is a single clone of
    /// `self`. If `other` swallows `self` entirely the result is empty.
    #[must_use]
    pub fn subtract(&self, other: &Self) -> Vec<Self> {
        if !self.intersects(other) {
            return vec![self.clone()];
        }

        let mut fragments = Vec::new();
        let mut remaining = self.clone();
        for face in other.face_indices() {
            let plane = other.face(face).plane;

            let mut fragment = remaining.clone();
            if let ClipResult::Clipped(_) = fragment.clip(&plane.flipped(), &mut NoopCallback)
                && fragment.polyhedron()
            {
                fragments.push(fragment);
            }

            if remaining.clip(&plane, &mut NoopCallback) == ClipResult::Empty {
                break;
            }
        }

        trace!(fragments = fragments.len(), "subtracted polyhedron");
        fragments
    }

    /// The convex intersection `self ∩ other`, possibly empty or
    /// degenerate.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        let mut result = self.clone();
        for face in other.face_indices() {
            let plane = other.face(face).plane;
            if result.clip(&plane, &mut NoopCallback) == ClipResult::Empty {
                break;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use glam::DVec3;

    use super::*;
    use crate::bbox::BoundingBox;

    #[test]
    fn test_subtract_disjoint_clones_self() {
        let a = Polyhedron::cuboid(&BoundingBox::cube(32.0));
        let b = Polyhedron::cuboid(&BoundingBox::new(
            DVec3::splat(100.0),
            DVec3::splat(164.0),
        ));
        let fragments = a.subtract(&b);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].vertex_count(), 8);
    }

    #[test]
    fn test_subtract_swallowed_is_empty() {
        let a = Polyhedron::cuboid(&BoundingBox::cube(16.0));
        let b = Polyhedron::cuboid(&BoundingBox::cube(32.0));
        assert!(a.subtract(&b).is_empty());
    }

    #[test]
    fn test_subtract_corner_overlap() {
        let a = Polyhedron::cuboid(&BoundingBox::cube(32.0));
        let b = Polyhedron::cuboid(&BoundingBox::new(
            DVec3::ZERO,
            DVec3::splat(64.0),
        ));
        let fragments = a.subtract(&b);
        assert_eq!(fragments.len(), 3);

        for fragment in &fragments {
            assert!(fragment.polyhedron());
            // Fragments lie inside the minuend and outside the subtrahend.
            assert!(a.contains(fragment));
            assert!(!b.intersection(fragment).polyhedron());
        }

        // Fragments are pairwise disjoint (no interior overlap).
        for i in 0..fragments.len() {
            for j in i + 1..fragments.len() {
                assert!(!fragments[i].intersection(&fragments[j]).polyhedron());
            }
        }

        // A point of A outside B is covered by some fragment.
        let sample = DVec3::new(-16.0, -16.0, -16.0);
        assert!(fragments.iter().any(|f| f.contains_point(sample)));
        // A point inside B is covered by none.
        let inside = DVec3::new(16.0, 16.0, 16.0);
        assert!(!fragments.iter().any(|f| f.contains_point(inside)));
    }

    #[test]
    fn test_intersection_of_overlapping_cubes() {
        let a = Polyhedron::cuboid(&BoundingBox::cube(32.0));
        let b = Polyhedron::cuboid(&BoundingBox::new(
            DVec3::ZERO,
            DVec3::splat(64.0),
        ));
        let inter = a.intersection(&b);
        assert!(inter.polyhedron());
        let bounds = inter.bounds();
        assert_eq!(bounds.min, DVec3::ZERO);
        assert_eq!(bounds.max, DVec3::splat(32.0));
    }

    #[test]
    fn test_intersection_disjoint_is_degenerate() {
        let a = Polyhedron::cuboid(&BoundingBox::cube(16.0));
        let b = Polyhedron::cuboid(&BoundingBox::new(
            DVec3::splat(50.0),
            DVec3::splat(80.0),
        ));
        assert!(!a.intersection(&b).polyhedron());
    }
}
