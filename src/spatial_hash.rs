//! Grid-based spatial hash for tolerant position lookup.
//!
//! Positions within the configured tolerance of each other are treated as
//! the same point. The grid cell size is twice the tolerance, so any match
//! for a query point lives in the 3x3x3 cell neighborhood around it and a
//! lookup never scans more than a handful of candidates.
//!
//! [`PositionMap`] associates a value with each stored position; the
//! zero-sized instantiation [`PositionSet`] is a plain membership set. Both
//! back the vertex-uniqueness invariant and the position-keyed vertex
//! mappings used by snapping and vertex moves.

use glam::DVec3;
use hashbrown::HashMap;

/// A map keyed by 3D position with epsilon-tolerant lookup.
#[derive(Clone, Debug)]
pub struct PositionMap<T> {
    cells: HashMap<(i64, i64, i64), Vec<(DVec3, T)>>,
    cell_size: f64,
    tolerance: f64,
}

/// A tolerant set of 3D positions.
pub type PositionSet = PositionMap<()>;

impl<T> PositionMap<T> {
    /// Create a position map with the given tolerance.
    #[must_use]
    pub fn new(tolerance: f64) -> Self {
        Self {
            cells: HashMap::new(),
            cell_size: tolerance * 2.0,
            tolerance,
        }
    }

    #[inline]
    fn cell_coords(&self, p: DVec3) -> (i64, i64, i64) {
        #[allow(clippy::cast_possible_truncation)]
        let discretize = |v: f64| (v / self.cell_size).floor() as i64;
        (discretize(p.x), discretize(p.y), discretize(p.z))
    }

    /// Insert a position and its value without checking for duplicates.
    pub fn insert(&mut self, point: DVec3, value: T) {
        self.cells
            .entry(self.cell_coords(point))
            .or_default()
            .push((point, value));
    }

    /// Look up the entry closest to `point` within tolerance.
    #[must_use]
    pub fn get(&self, point: DVec3) -> Option<&T> {
        self.get_entry(point).map(|(_, value)| value)
    }

    /// Look up the stored position and value closest to `point`.
    #[must_use]
    pub fn get_entry(&self, point: DVec3) -> Option<(DVec3, &T)> {
        let (cx, cy, cz) = self.cell_coords(point);
        let mut best: Option<(f64, DVec3, &T)> = None;

        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(entries) = self.cells.get(&(cx + dx, cy + dy, cz + dz)) else {
                        continue;
                    };
                    for (p, value) in entries {
                        let dist = (*p - point).length();
                        if dist < self.tolerance
                            && best.as_ref().is_none_or(|(d, _, _)| dist < *d)
                        {
                            best = Some((dist, *p, value));
                        }
                    }
                }
            }
        }

        best.map(|(_, p, value)| (p, value))
    }

    /// Returns `true` if a position within tolerance is stored.
    #[must_use]
    pub fn contains(&self, point: DVec3) -> bool {
        self.get_entry(point).is_some()
    }

    /// Insert only if no position within tolerance exists yet.
    /// Returns `true` if inserted.
    pub fn insert_if_unique(&mut self, point: DVec3, value: T) -> bool {
        if self.contains(point) {
            false
        } else {
            self.insert(point, value);
            true
        }
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.cells.clear();
    }
}

impl PositionSet {
    /// Build a set from a collection of positions.
    #[must_use]
    pub fn from_positions(tolerance: f64, positions: impl IntoIterator<Item = DVec3>) -> Self {
        let mut set = Self::new(tolerance);
        for p in positions {
            set.insert(p, ());
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::EPSILON;

    #[test]
    fn test_tolerant_lookup() {
        let mut map = PositionMap::new(1e-6);
        map.insert(DVec3::new(1.0, 2.0, 3.0), 7usize);

        assert_eq!(map.get(DVec3::new(1.0 + 1e-7, 2.0, 3.0)), Some(&7));
        assert_eq!(map.get(DVec3::new(1.1, 2.0, 3.0)), None);
    }

    #[test]
    fn test_insert_if_unique() {
        let mut set = PositionSet::new(EPSILON);
        assert!(set.insert_if_unique(DVec3::ZERO, ()));
        assert!(!set.insert_if_unique(DVec3::splat(1e-9), ()));
        assert!(set.insert_if_unique(DVec3::X, ()));
    }

    #[test]
    fn test_cell_boundary() {
        // Points on opposite sides of a cell boundary but within tolerance.
        let mut set = PositionSet::new(0.1);
        set.insert(DVec3::new(0.199, 0.0, 0.0), ());
        assert!(set.contains(DVec3::new(0.201, 0.0, 0.0)));
    }

    #[test]
    fn test_closest_wins() {
        let mut map = PositionMap::new(0.5);
        map.insert(DVec3::new(0.3, 0.0, 0.0), 'a');
        map.insert(DVec3::new(-0.1, 0.0, 0.0), 'b');
        assert_eq!(map.get(DVec3::ZERO), Some(&'b'));
    }
}
