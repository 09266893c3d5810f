//! Axis-aligned bounding box, used both as the world-bounds contract of
//! every mutating brush operation and as the seed volume for builds.

use glam::DVec3;

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner.
    pub min: DVec3,
    /// Maximum corner.
    pub max: DVec3,
}

impl BoundingBox {
    /// Creates a bounding box from min and max corners.
    #[must_use]
    pub const fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// Creates an empty (inverted) bounding box.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            min: DVec3::splat(f64::INFINITY),
            max: DVec3::splat(f64::NEG_INFINITY),
        }
    }

    /// Creates a cube of the given half-extent centered at the origin.
    #[must_use]
    pub fn cube(half_extent: f64) -> Self {
        Self {
            min: DVec3::splat(-half_extent),
            max: DVec3::splat(half_extent),
        }
    }

    /// Creates the smallest box containing all given points.
    #[must_use]
    pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Self {
        let mut bbox = Self::empty();
        for point in points {
            bbox = bbox.expanded_to_include(point);
        }
        bbox
    }

    /// Returns `true` if no point has been included yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    /// Grows the box to include a point.
    #[must_use]
    pub fn expanded_to_include(&self, point: DVec3) -> Self {
        Self {
            min: self.min.min(point),
            max: self.max.max(point),
        }
    }

    /// The box grown by `amount` on every side.
    #[must_use]
    pub fn expanded(&self, amount: f64) -> Self {
        Self {
            min: self.min - DVec3::splat(amount),
            max: self.max + DVec3::splat(amount),
        }
    }

    /// Center point.
    #[must_use]
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Full extents.
    #[must_use]
    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    /// Returns `true` if the box contains the point (boundary inclusive).
    #[must_use]
    pub fn contains_point(&self, point: DVec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Returns `true` if the box fully contains `other`.
    #[must_use]
    pub fn contains_bbox(&self, other: &Self) -> bool {
        other.min.cmpge(self.min).all() && other.max.cmple(self.max).all()
    }

    /// Returns `true` if the boxes overlap (boundary inclusive).
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }

    /// The eight corner points.
    #[must_use]
    pub fn vertices(&self) -> [DVec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            DVec3::new(a.x, a.y, a.z),
            DVec3::new(b.x, a.y, a.z),
            DVec3::new(b.x, b.y, a.z),
            DVec3::new(a.x, b.y, a.z),
            DVec3::new(a.x, a.y, b.z),
            DVec3::new(b.x, a.y, b.z),
            DVec3::new(b.x, b.y, b.z),
            DVec3::new(a.x, b.y, b.z),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points() {
        let bbox = BoundingBox::from_points([
            DVec3::new(1.0, -2.0, 3.0),
            DVec3::new(-1.0, 4.0, 0.0),
        ]);
        assert_eq!(bbox.min, DVec3::new(-1.0, -2.0, 0.0));
        assert_eq!(bbox.max, DVec3::new(1.0, 4.0, 3.0));
    }

    #[test]
    fn test_containment() {
        let outer = BoundingBox::cube(10.0);
        let inner = BoundingBox::cube(5.0);
        assert!(outer.contains_bbox(&inner));
        assert!(!inner.contains_bbox(&outer));
        assert!(outer.contains_point(DVec3::splat(10.0)));
        assert!(!outer.contains_point(DVec3::splat(10.5)));
    }

    #[test]
    fn test_intersects() {
        let a = BoundingBox::cube(1.0);
        let b = BoundingBox::new(DVec3::splat(0.5), DVec3::splat(2.0));
        let c = BoundingBox::new(DVec3::splat(3.0), DVec3::splat(4.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }
}
