//! Face matching between two polyhedra.
//!
//! When a brush edit rebuilds geometry from scratch (vertex moves, snap),
//! the new mesh has no payload links. The matcher relates the vertices of
//! the old and new polyhedra — directly by position, through a move
//! mapping, and by neighbour closure for vertices that appeared or
//! vanished — and then scores each new face against the old faces by how
//! many related vertex pairs their boundaries share. The best-scoring old
//! face donates its payload to the new face.

use rustc_hash::FxHashSet;

use glam::DVec3;

use crate::math::EPSILON;
use crate::polyhedron::{FaceIdx, Polyhedron, VertexIdx};
use crate::spatial_hash::PositionMap;

/// Relates the vertices of an old (`left`) and a new (`right`) polyhedron
/// and matches faces across them.
pub struct PolyhedronMatcher<'a> {
    left: &'a Polyhedron,
    right: &'a Polyhedron,
    relation: Vec<(VertexIdx, VertexIdx)>,
}

impl<'a> PolyhedronMatcher<'a> {
    /// Matcher for a rebuild that did not move any vertex.
    #[must_use]
    pub fn new(left: &'a Polyhedron, right: &'a Polyhedron) -> Self {
        Self::with_mapping(left, right, &PositionMap::new(EPSILON))
    }

    /// Matcher for a rebuild where the vertices at `moved` were translated
    /// by `delta`.
    #[must_use]
    pub fn with_moved_vertices(
        left: &'a Polyhedron,
        right: &'a Polyhedron,
        moved: &[DVec3],
        delta: DVec3,
    ) -> Self {
        let mut mapping = PositionMap::new(EPSILON);
        for &p in moved {
            mapping.insert(p, p + delta);
        }
        Self::with_mapping(left, right, &mapping)
    }

    /// Matcher for a rebuild with an arbitrary old-position to new-position
    /// mapping (e.g. grid snapping, where every vertex moves differently).
    #[must_use]
    pub fn with_vertex_mapping(
        left: &'a Polyhedron,
        right: &'a Polyhedron,
        mapping: &PositionMap<DVec3>,
    ) -> Self {
        Self::with_mapping(left, right, mapping)
    }

    fn with_mapping(
        left: &'a Polyhedron,
        right: &'a Polyhedron,
        mapping: &PositionMap<DVec3>,
    ) -> Self {
        let mut right_by_position: PositionMap<VertexIdx> = PositionMap::new(EPSILON);
        for r in right.vertex_indices() {
            right_by_position.insert(right.position(r), r);
        }

        // Base relation: each old vertex expects to reappear at its own
        // position, or at its mapped position if it was moved.
        let mut relation: Vec<(VertexIdx, VertexIdx)> = Vec::new();
        for l in left.vertex_indices() {
            let position = left.position(l);
            let expected = mapping.get(position).copied().unwrap_or(position);
            if let Some(&r) = right_by_position.get(expected) {
                relation.push((l, r));
            }
        }

        let matched_left: FxHashSet<usize> = relation.iter().map(|&(l, _)| l.0).collect();
        let matched_right: FxHashSet<usize> = relation.iter().map(|&(_, r)| r.0).collect();

        // Vanished old vertices inherit the matches of their neighbours, so
        // the faces they bounded still get credit.
        let mut expansion: Vec<(VertexIdx, VertexIdx)> = Vec::new();
        for l in left.vertex_indices() {
            if matched_left.contains(&l.0) {
                continue;
            }
            for neighbor in left.vertex_neighbors(l) {
                for &(nl, r) in &relation {
                    if nl == neighbor {
                        expansion.push((l, r));
                    }
                }
            }
        }
        // Newly created vertices likewise relate to the old vertices their
        // neighbours descend from.
        for r in right.vertex_indices() {
            if matched_right.contains(&r.0) {
                continue;
            }
            for neighbor in right.vertex_neighbors(r) {
                for &(l, nr) in &relation {
                    if nr == neighbor {
                        expansion.push((l, r));
                    }
                }
            }
        }
        relation.extend(expansion);

        Self {
            left,
            right,
            relation,
        }
    }

    /// Calls `visitor` for every face of the new polyhedron together with
    /// the best-matching old face, or `None` when no old face shares any
    /// related vertex pair with it.
    pub fn process_right_faces(&self, mut visitor: impl FnMut(Option<FaceIdx>, FaceIdx)) {
        let left_faces: Vec<(FaceIdx, FxHashSet<usize>)> = self
            .left
            .face_indices()
            .map(|f| (f, self.face_vertex_set(self.left, f)))
            .collect();

        for fr in self.right.face_indices() {
            let right_set = self.face_vertex_set(self.right, fr);
            let right_normal = self.right.face(fr).plane.normal;

            let mut best: Option<(FaceIdx, usize, f64)> = None;
            for (fl, left_set) in &left_faces {
                let score = self
                    .relation
                    .iter()
                    .filter(|(l, r)| left_set.contains(&l.0) && right_set.contains(&r.0))
                    .count();
                if score == 0 {
                    continue;
                }
                let alignment = self.left.face(*fl).plane.normal.dot(right_normal);
                let better = match best {
                    None => true,
                    Some((_, best_score, best_alignment)) => {
                        score > best_score
                            || (score == best_score && alignment > best_alignment)
                    }
                };
                if better {
                    best = Some((*fl, score, alignment));
                }
            }
            visitor(best.map(|(fl, _, _)| fl), fr);
        }
    }

    /// Calls `visitor` for every related vertex pair shared by the two
    /// face boundaries.
    pub fn visit_matching_vertex_pairs(
        &self,
        left_face: FaceIdx,
        right_face: FaceIdx,
        mut visitor: impl FnMut(VertexIdx, VertexIdx),
    ) {
        let left_set = self.face_vertex_set(self.left, left_face);
        let right_set = self.face_vertex_set(self.right, right_face);
        for &(l, r) in &self.relation {
            if left_set.contains(&l.0) && right_set.contains(&r.0) {
                visitor(l, r);
            }
        }
    }

    fn face_vertex_set(&self, poly: &Polyhedron, face: FaceIdx) -> FxHashSet<usize> {
        poly.face_half_edges(face)
            .into_iter()
            .map(|h| poly.half_edge(h).origin.0)
            .collect()
    }

    /// The old polyhedron.
    #[must_use]
    pub fn left(&self) -> &Polyhedron {
        self.left
    }

    /// The new polyhedron.
    #[must_use]
    pub fn right(&self) -> &Polyhedron {
        self.right
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BoundingBox;
    use crate::math::almost_equal_vec;
    use rustc_hash::FxHashMap;

    fn match_map(matcher: &PolyhedronMatcher<'_>) -> FxHashMap<usize, Option<usize>> {
        let mut result = FxHashMap::default();
        matcher.process_right_faces(|left, right| {
            result.insert(right.0, left.map(|f| f.0));
        });
        result
    }

    #[test]
    fn test_identity_match_pairs_equal_planes() {
        let cube = Polyhedron::cuboid(&BoundingBox::cube(32.0));
        let copy = cube.clone();
        let matcher = PolyhedronMatcher::new(&cube, &copy);

        let matches = match_map(&matcher);
        assert_eq!(matches.len(), 6);
        for (right, left) in matches {
            let left = left.expect("every face has a match");
            assert!(
                cube.face(FaceIdx(left))
                    .plane
                    .almost_equal(&copy.face(FaceIdx(right)).plane)
            );
        }
    }

    #[test]
    fn test_translated_match_through_mapping() {
        let cube = Polyhedron::cuboid(&BoundingBox::cube(32.0));
        let delta = DVec3::new(8.0, -16.0, 24.0);
        let moved = Polyhedron::from_points(cube.vertex_positions().into_iter().map(|p| p + delta));

        // Without the mapping nothing lines up.
        let blind = PolyhedronMatcher::new(&cube, &moved);
        let blind_matches = match_map(&blind);
        assert!(blind_matches.values().all(Option::is_none));

        let matcher =
            PolyhedronMatcher::with_moved_vertices(&cube, &moved, &cube.vertex_positions(), delta);
        let matches = match_map(&matcher);
        for (right, left) in matches {
            let left = left.expect("every face has a match");
            assert!(almost_equal_vec(
                cube.face(FaceIdx(left)).plane.normal,
                moved.face(FaceIdx(right)).plane.normal
            ));
        }
    }

    #[test]
    fn test_single_moved_vertex_keeps_face_identity() {
        let cube = Polyhedron::cuboid(&BoundingBox::cube(32.0));
        let corner = DVec3::splat(32.0);
        let delta = DVec3::new(0.0, 0.0, 8.0);
        let rebuilt = Polyhedron::from_points(
            cube.vertex_positions()
                .into_iter()
                .map(|p| if almost_equal_vec(p, corner) { p + delta } else { p }),
        );

        let matcher = PolyhedronMatcher::with_moved_vertices(&cube, &rebuilt, &[corner], delta);
        let mut matched = 0;
        matcher.process_right_faces(|left, _right| {
            if left.is_some() {
                matched += 1;
            }
        });
        // Every face of the rebuilt solid descends from some original face.
        assert_eq!(matched, rebuilt.face_count());
    }

    #[test]
    fn test_matching_vertex_pairs_on_shared_face() {
        let cube = Polyhedron::cuboid(&BoundingBox::cube(32.0));
        let copy = cube.clone();
        let matcher = PolyhedronMatcher::new(&cube, &copy);

        let mut pairs = Vec::new();
        matcher.process_right_faces(|left, right| {
            if let Some(left) = left {
                matcher.visit_matching_vertex_pairs(left, right, |l, r| {
                    pairs.push((l, r));
                });
            }
        });
        // 6 faces x 4 corners.
        assert_eq!(pairs.len(), 24);
        for (l, r) in pairs {
            assert!(almost_equal_vec(cube.position(l), copy.position(r)));
        }
    }
}
