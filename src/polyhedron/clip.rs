//! Plane clipping and topology healing.
//!
//! [`Polyhedron::clip`] cuts the solid with an oriented plane and removes
//! everything above it. Unlike hull insertion this is genuine half-edge
//! surgery: faces that survive keep their identity (and payload handle),
//! faces that span the plane are split so the kept part stays the original,
//! and the hole is closed with a single new cap face on the clip plane.
//!
//! Clients observe the surgery through [`GeometryCallback`], which is how
//! the brush layer keeps its face list in sync with the mesh.

use glam::DVec3;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::math::{CORRECT_EPSILON, EPSILON, MIN_EDGE_LENGTH};
use crate::plane::{Plane, PointStatus};
use crate::polyhedron::{
    Edge, EdgeIdx, FaceIdx, HalfEdgeIdx, Polyhedron, VertexIdx, plane_from_loop,
};

/// Observer of topological surgery on a [`Polyhedron`].
///
/// The polyhedron is passed mutably so an observer can update face payload
/// handles while reacting.
pub trait GeometryCallback {
    /// A brand-new face appeared (e.g. the cap closing a clip).
    fn face_was_created(&mut self, poly: &mut Polyhedron, face: FaceIdx) {
        let _ = (poly, face);
    }

    /// `original` was split; `clone` took over part of its boundary.
    /// The clone starts with no payload.
    fn face_was_split(&mut self, poly: &mut Polyhedron, original: FaceIdx, clone: FaceIdx) {
        let _ = (poly, original, clone);
    }

    /// The face is about to be removed from the mesh.
    fn face_will_be_deleted(&mut self, poly: &mut Polyhedron, face: FaceIdx) {
        let _ = (poly, face);
    }

    /// `to_delete` is about to be merged into `remaining`.
    fn faces_will_be_merged(&mut self, poly: &mut Polyhedron, remaining: FaceIdx, to_delete: FaceIdx) {
        let _ = (poly, remaining, to_delete);
    }
}

/// Callback that ignores every event.
pub struct NoopCallback;

impl GeometryCallback for NoopCallback {}

/// Outcome of clipping a polyhedron with a plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipResult {
    /// The polyhedron lies entirely below or on the plane.
    Unchanged,
    /// The polyhedron lay entirely above the plane and is now empty.
    Empty,
    /// Material was removed; the hole is closed by the given cap face.
    Clipped(FaceIdx),
}

impl Polyhedron {
    /// Cuts away the part of the polyhedron above `plane`.
    ///
    /// Must only be called on a closed polyhedron. Faces entirely below the
    /// plane are untouched, spanning faces are split with the kept part
    /// retaining the original face identity, and the resulting hole is
    /// capped with a new face lying on the clip plane.
    pub fn clip(&mut self, plane: &Plane, cb: &mut dyn GeometryCallback) -> ClipResult {
        let mut status: FxHashMap<usize, PointStatus> = FxHashMap::default();
        for v in self.vertex_indices() {
            status.insert(v.0, plane.point_status(self.position(v)));
        }

        if !status.values().any(|&s| s == PointStatus::Above) {
            return ClipResult::Unchanged;
        }
        if !status.values().any(|&s| s == PointStatus::Below) {
            for face in self.face_indices().collect::<Vec<_>>() {
                cb.face_will_be_deleted(self, face);
            }
            self.clear();
            return ClipResult::Empty;
        }

        self.split_crossing_edges(plane, &mut status);
        self.split_spanning_faces(&status, cb);

        // Everything left with an origin above the plane is doomed.
        let doomed: Vec<FaceIdx> = self
            .face_indices()
            .filter(|&f| {
                self.face_half_edges(f).iter().any(|&h| {
                    status[&self.half_edge(h).origin.0] == PointStatus::Above
                })
            })
            .collect();
        debug_assert!(!doomed.is_empty());

        for &face in &doomed {
            cb.face_will_be_deleted(self, face);
        }
        let cap = self.replace_with_cap(&doomed, plane);
        cb.face_was_created(self, cap);
        ClipResult::Clipped(cap)
    }

    /// Splits every edge with one endpoint above and one below the plane,
    /// recording the new vertices as on-plane.
    fn split_crossing_edges(&mut self, plane: &Plane, status: &mut FxHashMap<usize, PointStatus>) {
        for e in self.edge_indices().collect::<Vec<_>>() {
            let Edge { first, second } = *self.edge(e);
            let a = self.half_edge(first).origin;
            let b = self.half_edge(second).origin;
            let crossing = matches!(
                (status[&a.0], status[&b.0]),
                (PointStatus::Above, PointStatus::Below)
                    | (PointStatus::Below, PointStatus::Above)
            );
            if !crossing {
                continue;
            }
            let pa = self.position(a);
            let pb = self.position(b);
            let da = plane.signed_distance(pa);
            let db = plane.signed_distance(pb);
            let point = pa + (pb - pa) * (da / (da - db));
            let w = self.split_edge(e, point);
            status.insert(w.0, PointStatus::On);
        }
    }

    /// Splits a polyhedron edge at an interior point, returning the new
    /// vertex. The two incident faces each gain one boundary half-edge.
    pub(crate) fn split_edge(&mut self, e: EdgeIdx, point: DVec3) -> VertexIdx {
        let Edge { first: h, second: t } = *self.edge(e);
        let w = self.alloc_vertex(point);
        let face_h = self.half_edge(h).face;
        let face_t = self.half_edge(t).face;
        let h_next = self.half_edge(h).next;
        let t_next = self.half_edge(t).next;

        // h keeps the near part and the original edge slot; h2 continues to
        // the far endpoint, twinned with t on a fresh edge.
        let h2 = self.alloc_half_edge(w);
        let t2 = self.alloc_half_edge(w);
        let e2 = self.alloc_edge(h2, t);
        {
            let m = self.half_edge_mut(h);
            m.next = h2;
            m.twin = t2;
        }
        {
            let m = self.half_edge_mut(h2);
            m.next = h_next;
            m.face = face_h;
            m.twin = t;
            m.edge = e2;
        }
        {
            let m = self.half_edge_mut(t);
            m.next = t2;
            m.twin = h2;
            m.edge = e2;
        }
        {
            let m = self.half_edge_mut(t2);
            m.next = t_next;
            m.face = face_t;
            m.twin = h;
            m.edge = e;
        }
        let edge = self.edge_mut(e);
        edge.first = h;
        edge.second = t2;
        self.vertex_mut(w).leaving = Some(h2);
        w
    }

    /// Splits every face whose boundary has origins on both sides of the
    /// plane. After edge splitting the above-run of a convex face is
    /// bracketed by two on-plane vertices, which become the chord.
    fn split_spanning_faces(
        &mut self,
        status: &FxHashMap<usize, PointStatus>,
        cb: &mut dyn GeometryCallback,
    ) {
        for f in self.face_indices().collect::<Vec<_>>() {
            let hs = self.face_half_edges(f);
            let st: Vec<PointStatus> = hs
                .iter()
                .map(|&h| status[&self.half_edge(h).origin.0])
                .collect();
            if !(st.contains(&PointStatus::Above) && st.contains(&PointStatus::Below)) {
                continue;
            }

            let n = hs.len();
            let a0 = st
                .iter()
                .position(|&s| s == PointStatus::Above)
                .expect("checked above");
            // March to the on-plane vertices bracketing the above-run.
            let mut i = a0;
            while st[(i + n - 1) % n] == PointStatus::Above {
                i = (i + n - 1) % n;
            }
            i = (i + n - 1) % n;
            let mut j = a0;
            while st[j] == PointStatus::Above {
                j = (j + 1) % n;
            }
            debug_assert_eq!(st[i], PointStatus::On);
            debug_assert_eq!(st[j], PointStatus::On);

            let clone = self.split_face(f, &hs, i, j);
            cb.face_was_split(self, f, clone);
        }
    }

    /// Splits face `f` along the chord from `origin(hs[i])` to
    /// `origin(hs[j])`. The arc `hs[i]..hs[j-1]` moves to a new clone face;
    /// the rest stays with `f`.
    fn split_face(&mut self, f: FaceIdx, hs: &[HalfEdgeIdx], i: usize, j: usize) -> FaceIdx {
        let n = hs.len();
        let h_i = hs[i];
        let h_j = hs[j];
        let prev_i = hs[(i + n - 1) % n];
        let prev_j = hs[(j + n - 1) % n];
        let v_i = self.half_edge(h_i).origin;
        let v_j = self.half_edge(h_j).origin;

        let c1 = self.alloc_half_edge(v_j);
        let c2 = self.alloc_half_edge(v_i);
        let chord = self.alloc_edge(c1, c2);
        let plane = self.face(f).plane;
        let clone = self.alloc_face(c1, plane, None);

        let mut k = i;
        while k != j {
            self.half_edge_mut(hs[k]).face = Some(clone);
            k = (k + 1) % n;
        }
        {
            let m = self.half_edge_mut(c1);
            m.twin = c2;
            m.edge = chord;
            m.next = h_i;
            m.face = Some(clone);
        }
        {
            let m = self.half_edge_mut(c2);
            m.twin = c1;
            m.edge = chord;
            m.next = h_j;
            m.face = Some(f);
        }
        self.half_edge_mut(prev_j).next = c1;
        self.half_edge_mut(prev_i).next = c2;
        self.face_mut(f).boundary = c2;
        clone
    }

    /// Deletes the doomed faces and closes the hole with a single cap face
    /// on `plane`. The seam half-edges on the doomed side are reused as the
    /// cap boundary, which keeps their twins (in kept faces) untouched.
    fn replace_with_cap(&mut self, doomed: &[FaceIdx], plane: &Plane) -> FaceIdx {
        let doomed_set: FxHashSet<usize> = doomed.iter().map(|f| f.0).collect();

        let mut seam: Vec<HalfEdgeIdx> = Vec::new();
        let mut interior: Vec<HalfEdgeIdx> = Vec::new();
        for &f in doomed {
            for h in self.face_half_edges(f) {
                let twin = self.half_edge(h).twin;
                let twin_doomed = self
                    .half_edge(twin)
                    .face
                    .is_some_and(|tf| doomed_set.contains(&tf.0));
                if twin_doomed {
                    interior.push(h);
                } else {
                    seam.push(h);
                }
            }
        }
        debug_assert!(seam.len() >= 3);

        let cap = self.alloc_face(seam[0], *plane, None);
        let by_origin: FxHashMap<usize, HalfEdgeIdx> = seam
            .iter()
            .map(|&s| (self.half_edge(s).origin.0, s))
            .collect();
        for &s in &seam {
            let next = by_origin[&self.destination(s).0];
            let m = self.half_edge_mut(s);
            m.next = next;
            m.face = Some(cap);
        }

        let mut freed_edges: FxHashSet<usize> = FxHashSet::default();
        for h in interior {
            let edge = self.half_edge(h).edge;
            if freed_edges.insert(edge.0) {
                self.free_edge(edge);
            }
            self.free_half_edge(h);
        }
        for &f in doomed {
            self.free_face(f);
        }
        self.rebuild_leaving_and_drop_orphans();
        cap
    }

    /// Recomputes every vertex's leaving pointer from the live half-edges
    /// and frees vertices no half-edge leaves anymore.
    fn rebuild_leaving_and_drop_orphans(&mut self) {
        for slot in self.vertices.iter_mut().flatten() {
            slot.leaving = None;
        }
        for i in 0..self.half_edges.len() {
            if let Some(half_edge) = self.half_edges[i] {
                self.vertex_mut(half_edge.origin).leaving = Some(HalfEdgeIdx(i));
            }
        }
        for v in self.vertex_indices().collect::<Vec<_>>() {
            if self.vertex(v).leaving.is_none() {
                self.free_vertex(v);
            }
        }
    }

    // HEALING

    /// Repairs numerical damage after vertex snapping: collapses edges
    /// shorter than [`MIN_EDGE_LENGTH`], merges faces that became coplanar
    /// and drops redundant collinear vertices.
    ///
    /// Returns `true` if the result is still a valid closed polyhedron.
    pub fn heal_edges(&mut self, cb: &mut dyn GeometryCallback) -> bool {
        self.collapse_short_edges(cb);
        self.merge_coplanar_faces(cb);
        self.polyhedron()
    }

    /// Merges every pair of adjacent faces with (nearly) equal planes, then
    /// removes vertices the merges made redundant.
    pub(crate) fn merge_coplanar_faces(&mut self, cb: &mut dyn GeometryCallback) {
        loop {
            let candidate = self.edge_indices().find_map(|e| {
                let edge = *self.edge(e);
                let f1 = self.half_edge(edge.first).face?;
                let f2 = self.half_edge(edge.second).face?;
                (f1 != f2 && self.face(f1).plane.almost_equal(&self.face(f2).plane))
                    .then_some(edge.first)
            });
            let Some(h) = candidate else { break };
            self.merge_neighbours(h, cb);
        }
        self.remove_redundant_vertices();
    }

    /// Merges the face across `h`'s twin into `h`'s face. Handles runs of
    /// consecutive shared edges.
    fn merge_neighbours(&mut self, h: HalfEdgeIdx, cb: &mut dyn GeometryCallback) {
        let f = self.half_edge(h).face.expect("merge needs incident face");
        let twin = self.half_edge(h).twin;
        let g = self.half_edge(twin).face.expect("merge needs incident face");
        cb.faces_will_be_merged(self, f, g);

        let twin_in_g = |poly: &Self, he: HalfEdgeIdx| {
            let t = poly.half_edge(he).twin;
            poly.half_edge(t).face == Some(g)
        };

        // Extend to the maximal run of shared edges around h.
        let mut first = h;
        loop {
            let p = self.prev_in_face(first);
            if p == h || !twin_in_g(self, p) {
                break;
            }
            first = p;
        }
        let mut last = h;
        loop {
            let n = self.half_edge(last).next;
            if n == first || !twin_in_g(self, n) {
                break;
            }
            last = n;
        }

        let before = self.prev_in_face(first);
        let after = self.half_edge(last).next;
        let gn = self.half_edge(self.half_edge(first).twin).next;
        let gp = self.prev_in_face(self.half_edge(last).twin);
        let run_start_vertex = self.half_edge(first).origin;
        let run_end_vertex = self.destination(last);

        // Adopt g's surviving arc into f.
        let mut cur = gn;
        loop {
            self.half_edge_mut(cur).face = Some(f);
            if cur == gp {
                break;
            }
            cur = self.half_edge(cur).next;
        }
        self.half_edge_mut(before).next = gn;
        self.half_edge_mut(gp).next = after;
        self.face_mut(f).boundary = before;
        self.vertex_mut(run_start_vertex).leaving = Some(gn);
        self.vertex_mut(run_end_vertex).leaving = Some(after);

        // Free the run (both halves, their edges, interior vertices).
        let mut run = vec![first];
        let mut cur = first;
        while cur != last {
            cur = self.half_edge(cur).next;
            run.push(cur);
        }
        for (k, &r) in run.iter().enumerate() {
            if k > 0 {
                self.free_vertex(self.half_edge(r).origin);
            }
            let t = self.half_edge(r).twin;
            let edge = self.half_edge(r).edge;
            self.free_half_edge(r);
            self.free_half_edge(t);
            self.free_edge(edge);
        }
        self.free_face(g);
    }

    /// Removes vertices with exactly two incident edges whose neighbors are
    /// collinear with them.
    pub(crate) fn remove_redundant_vertices(&mut self) {
        loop {
            let candidate = self.vertex_indices().find(|&v| {
                let leaving = self.leaving_half_edges(v);
                leaving.len() == 2 && {
                    let p = self.position(v);
                    let a = self.position(self.destination(leaving[0]));
                    let b = self.position(self.destination(leaving[1]));
                    let u = a - p;
                    let w = b - p;
                    u.cross(w).length_squared() < EPSILON * u.length_squared() * w.length_squared()
                }
            });
            let Some(v) = candidate else { break };
            self.remove_degree_two_vertex(v);
        }
    }

    fn remove_degree_two_vertex(&mut self, v: VertexIdx) {
        let leaving = self.leaving_half_edges(v);
        let e1 = leaving[0];
        let e2 = leaving[1];
        let t1 = self.half_edge(e1).twin;
        let t2 = self.half_edge(e2).twin;
        debug_assert_eq!(self.half_edge(t1).next, e2);
        debug_assert_eq!(self.half_edge(t2).next, e1);

        let a = self.half_edge(t1).origin;
        let e1_next = self.half_edge(e1).next;
        let prev_t1 = self.prev_in_face(t1);

        // e2 absorbs the span: it now runs from a past the removed vertex.
        self.half_edge_mut(e2).origin = a;
        self.half_edge_mut(t2).next = e1_next;
        self.half_edge_mut(prev_t1).next = e2;

        if let Some(f1) = self.half_edge(t1).face
            && self.face(f1).boundary == t1
        {
            self.face_mut(f1).boundary = e2;
        }
        if let Some(f2) = self.half_edge(e1).face
            && self.face(f2).boundary == e1
        {
            self.face_mut(f2).boundary = t2;
        }
        self.vertex_mut(a).leaving = Some(e2);

        let edge = self.half_edge(e1).edge;
        self.free_half_edge(e1);
        self.free_half_edge(t1);
        self.free_edge(edge);
        self.free_vertex(v);
    }

    /// Collapses every edge shorter than [`MIN_EDGE_LENGTH`], eliminating
    /// the two-sided faces a collapse can leave behind.
    fn collapse_short_edges(&mut self, cb: &mut dyn GeometryCallback) {
        loop {
            let candidate = self.edge_indices().find(|&e| {
                let s = self.edge_segment(e);
                (s.end - s.start).length() < MIN_EDGE_LENGTH
            });
            let Some(e) = candidate else { break };
            self.collapse_edge(e);
            self.remove_digons(cb);
        }
    }

    /// Merges the second endpoint of `e` into the first.
    fn collapse_edge(&mut self, e: EdgeIdx) {
        let Edge { first: h, second: t } = *self.edge(e);
        let a = self.half_edge(h).origin;
        let b = self.half_edge(t).origin;

        for leaving in self.leaving_half_edges(b) {
            self.half_edge_mut(leaving).origin = a;
        }

        let prev_h = self.prev_in_face(h);
        let next_h = self.half_edge(h).next;
        let prev_t = self.prev_in_face(t);
        let next_t = self.half_edge(t).next;
        self.half_edge_mut(prev_h).next = next_h;
        self.half_edge_mut(prev_t).next = next_t;
        if let Some(f) = self.half_edge(h).face
            && self.face(f).boundary == h
        {
            self.face_mut(f).boundary = next_h;
        }
        if let Some(f) = self.half_edge(t).face
            && self.face(f).boundary == t
        {
            self.face_mut(f).boundary = next_t;
        }
        self.vertex_mut(a).leaving = Some(next_t);

        self.free_half_edge(h);
        self.free_half_edge(t);
        self.free_edge(e);
        self.free_vertex(b);
    }

    /// Deletes faces that degenerated to two boundary half-edges by fusing
    /// their two edges into one.
    fn remove_digons(&mut self, cb: &mut dyn GeometryCallback) {
        loop {
            let candidate = self
                .face_indices()
                .find(|&f| self.face_half_edges(f).len() == 2);
            let Some(f) = candidate else { break };
            cb.face_will_be_deleted(self, f);

            let hs = self.face_half_edges(f);
            let (h1, h2) = (hs[0], hs[1]);
            let outer1 = self.half_edge(h1).twin;
            let outer2 = self.half_edge(h2).twin;
            let e1 = self.half_edge(h1).edge;
            let e2 = self.half_edge(h2).edge;
            let x = self.half_edge(h1).origin;
            let y = self.half_edge(h2).origin;

            self.half_edge_mut(outer1).twin = outer2;
            self.half_edge_mut(outer1).edge = e1;
            self.half_edge_mut(outer2).twin = outer1;
            self.half_edge_mut(outer2).edge = e1;
            {
                let edge = self.edge_mut(e1);
                edge.first = outer1;
                edge.second = outer2;
            }
            self.vertex_mut(x).leaving = Some(outer2);
            self.vertex_mut(y).leaving = Some(outer1);

            self.free_edge(e2);
            self.free_half_edge(h1);
            self.free_half_edge(h2);
            self.free_face(f);
        }
    }

    /// Snaps vertex coordinates to the nearest integer when they are within
    /// [`CORRECT_EPSILON`], then refreshes face planes from the moved loops.
    pub fn correct_vertex_positions(&mut self) {
        let snap = |c: f64| {
            let r = c.round();
            if (c - r).abs() < CORRECT_EPSILON { r } else { c }
        };
        for slot in self.vertices.iter_mut().flatten() {
            slot.position = DVec3::new(
                snap(slot.position.x),
                snap(slot.position.y),
                snap(slot.position.z),
            );
        }
        for f in self.face_indices().collect::<Vec<_>>() {
            let positions = self.face_vertex_positions(f);
            if let Some(plane) = plane_from_loop(&positions) {
                self.face_mut(f).plane = plane;
            }
        }
    }
}
