//! # Half-Edge Polyhedron
//!
//! The geometric core of the crate: a convex solid stored as a half-edge
//! mesh. Every edge is represented by two oppositely-directed **half-edges**,
//! each belonging to the face on its left (looking from outside along the
//! face normal, boundaries run counter-clockwise).
//!
//! ## Degenerate States
//!
//! A polyhedron passes through lower-dimensional states while points are
//! added incrementally, and operations must handle all of them:
//!
//! | State        | Predicate      | Contents                                |
//! |--------------|----------------|-----------------------------------------|
//! | Empty        | `empty()`      | nothing                                 |
//! | Point        | `point()`      | 1 vertex                                |
//! | Edge         | `edge()`       | 2 vertices, 1 edge, no faces            |
//! | Polygon      | `polygon()`    | 1 face, boundary half-edges have no face|
//! | Polyhedron   | `polyhedron()` | ≥ 4 faces, closed                       |
//!
//! `closed()` holds exactly when every half-edge has an incident face.
//!
//! ## Storage
//!
//! Elements live in sparse arenas (`Vec<Option<T>>` plus free lists) and
//! refer to each other through typed indices. Indices stay stable across
//! unrelated insertions and deletions, which is what lets face payload
//! associations survive clipping.

#![allow(clippy::missing_errors_doc)]

mod clip;
mod hull;
mod queries;
mod subtract;

pub use clip::{ClipResult, GeometryCallback, NoopCallback};

use glam::DVec3;
use rustc_hash::FxHashMap;

use crate::bbox::BoundingBox;
use crate::math::{EPSILON, Segment3};
use crate::plane::Plane;
use crate::spatial_hash::PositionMap;

// TYPE-SAFE INDICES - Prevent mixing up different index types at compile time

/// Index into the vertex arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexIdx(pub usize);

/// Index into the half-edge arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HalfEdgeIdx(pub usize);

/// Index into the edge arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeIdx(pub usize);

/// Index into the face arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceIdx(pub usize);

/// Opaque handle a client attaches to a face to track it through clips,
/// splits and rebuilds.
pub type PayloadId = usize;

/// A corner of the polyhedron.
#[derive(Clone, Copy, Debug)]
pub struct Vertex {
    /// Position in space.
    pub position: DVec3,
    /// Some half-edge leaving this vertex, `None` for an isolated point.
    pub leaving: Option<HalfEdgeIdx>,
}

/// One direction of an edge, belonging to the face on its left.
#[derive(Clone, Copy, Debug)]
pub struct HalfEdge {
    /// Vertex this half-edge leaves.
    pub origin: VertexIdx,
    /// The oppositely-directed companion.
    pub twin: HalfEdgeIdx,
    /// Successor in the boundary cycle of `face`.
    pub next: HalfEdgeIdx,
    /// Incident face, `None` on the open boundary of a non-closed mesh.
    pub face: Option<FaceIdx>,
    /// The full edge this half belongs to.
    pub edge: EdgeIdx,
}

/// An undirected edge: a pair of twin half-edges.
#[derive(Clone, Copy, Debug)]
pub struct Edge {
    pub first: HalfEdgeIdx,
    pub second: HalfEdgeIdx,
}

/// A planar facet bounded by a cycle of half-edges.
#[derive(Clone, Copy, Debug)]
pub struct Face {
    /// One half-edge of the boundary cycle.
    pub boundary: HalfEdgeIdx,
    /// Supporting plane, normal facing outward.
    pub plane: Plane,
    /// Client payload handle, carried through topological surgery.
    pub payload: Option<PayloadId>,
}

/// A convex solid (or one of its degenerate lower-dimensional states) as a
/// half-edge mesh.
#[derive(Clone, Debug, Default)]
pub struct Polyhedron {
    vertices: Vec<Option<Vertex>>,
    half_edges: Vec<Option<HalfEdge>>,
    edges: Vec<Option<Edge>>,
    faces: Vec<Option<Face>>,
    free_vertices: Vec<usize>,
    free_half_edges: Vec<usize>,
    free_edges: Vec<usize>,
    free_faces: Vec<usize>,
}

impl Polyhedron {
    /// An empty polyhedron.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Axis-aligned cuboid spanning the given box.
    #[must_use]
    pub fn cuboid(bounds: &BoundingBox) -> Self {
        let v = bounds.vertices();
        // v[0]=min .. v[3] bottom ring CCW from above, v[4..8] top ring.
        let loops: [[usize; 4]; 6] = [
            [0, 3, 2, 1], // bottom, -Z
            [4, 5, 6, 7], // top, +Z
            [0, 1, 5, 4], // front, -Y
            [2, 3, 7, 6], // back, +Y
            [0, 4, 7, 3], // left, -X
            [1, 2, 6, 5], // right, +X
        ];
        let faces = loops
            .iter()
            .map(|indices| {
                let positions: Vec<DVec3> = indices.iter().map(|&i| v[i]).collect();
                let plane = Plane::from_points(positions[0], positions[1], positions[2])
                    .expect("cuboid faces are non-degenerate");
                (plane, positions)
            })
            .collect();
        Self::weave(faces)
    }

    /// Stitches a polyhedron (or polygon) from face loops.
    ///
    /// Each loop lists vertex positions counter-clockwise seen from outside.
    /// Vertices within [`EPSILON`] are merged; half-edges are twinned by
    /// their endpoint pair. Loops whose opposite side has no face get
    /// boundary twins with `face: None`, so a single loop produces the
    /// polygon state.
    ///
    /// # Panics
    /// Panics if a loop has fewer than three vertices.
    #[must_use]
    pub fn weave(face_loops: Vec<(Plane, Vec<DVec3>)>) -> Self {
        let mut poly = Self::new();
        let mut positions: PositionMap<VertexIdx> = PositionMap::new(EPSILON);
        let mut open: FxHashMap<(usize, usize), HalfEdgeIdx> = FxHashMap::default();

        for (plane, positions_loop) in face_loops {
            assert!(positions_loop.len() >= 3, "face loop needs >= 3 vertices");
            let vertex_indices: Vec<VertexIdx> = positions_loop
                .iter()
                .map(|&p| {
                    positions.get(p).copied().unwrap_or_else(|| {
                        let v = poly.alloc_vertex(p);
                        positions.insert(p, v);
                        v
                    })
                })
                .collect();

            let n = vertex_indices.len();
            let halves: Vec<HalfEdgeIdx> = vertex_indices
                .iter()
                .map(|&v| poly.alloc_half_edge(v))
                .collect();
            let face = poly.alloc_face(halves[0], plane, None);

            for i in 0..n {
                let h = halves[i];
                let a = vertex_indices[i];
                let b = vertex_indices[(i + 1) % n];
                poly.half_edge_mut(h).next = halves[(i + 1) % n];
                poly.half_edge_mut(h).face = Some(face);
                poly.vertex_mut(a).leaving = Some(h);

                if let Some(opposite) = open.remove(&(b.0, a.0)) {
                    let edge = poly.alloc_edge(opposite, h);
                    poly.half_edge_mut(h).twin = opposite;
                    poly.half_edge_mut(h).edge = edge;
                    poly.half_edge_mut(opposite).twin = h;
                    poly.half_edge_mut(opposite).edge = edge;
                } else {
                    open.insert((a.0, b.0), h);
                }
            }
        }

        // Any half-edge still unmatched borders open surface: give it a
        // boundary twin and link the boundary cycle by origin.
        let mut boundary_by_origin: FxHashMap<usize, HalfEdgeIdx> = FxHashMap::default();
        let mut boundary_twins = Vec::new();
        for (&(a, b), &h) in &open {
            let t = poly.alloc_half_edge(VertexIdx(b));
            let edge = poly.alloc_edge(h, t);
            poly.half_edge_mut(h).twin = t;
            poly.half_edge_mut(h).edge = edge;
            poly.half_edge_mut(t).twin = h;
            poly.half_edge_mut(t).edge = edge;
            boundary_by_origin.insert(b, t);
            boundary_twins.push((t, a));
        }
        for (t, dest) in boundary_twins {
            let next = boundary_by_origin[&dest];
            poly.half_edge_mut(t).next = next;
        }

        poly
    }

    // ARENA ACCESS
    //
    // Indexing a freed slot is a bug in the kernel, not a recoverable
    // condition, so these panic.

    #[inline]
    pub(crate) fn vertex(&self, idx: VertexIdx) -> &Vertex {
        self.vertices[idx.0].as_ref().expect("stale vertex index")
    }

    #[inline]
    pub(crate) fn vertex_mut(&mut self, idx: VertexIdx) -> &mut Vertex {
        self.vertices[idx.0].as_mut().expect("stale vertex index")
    }

    #[inline]
    pub(crate) fn half_edge(&self, idx: HalfEdgeIdx) -> &HalfEdge {
        self.half_edges[idx.0]
            .as_ref()
            .expect("stale half-edge index")
    }

    #[inline]
    pub(crate) fn half_edge_mut(&mut self, idx: HalfEdgeIdx) -> &mut HalfEdge {
        self.half_edges[idx.0]
            .as_mut()
            .expect("stale half-edge index")
    }

    #[inline]
    pub(crate) fn edge(&self, idx: EdgeIdx) -> &Edge {
        self.edges[idx.0].as_ref().expect("stale edge index")
    }

    #[inline]
    pub(crate) fn edge_mut(&mut self, idx: EdgeIdx) -> &mut Edge {
        self.edges[idx.0].as_mut().expect("stale edge index")
    }

    /// Face accessor; public because brush-level callbacks receive face
    /// indices and need to read planes and payloads back.
    #[inline]
    #[must_use]
    pub fn face(&self, idx: FaceIdx) -> &Face {
        self.faces[idx.0].as_ref().expect("stale face index")
    }

    #[inline]
    pub(crate) fn face_mut(&mut self, idx: FaceIdx) -> &mut Face {
        self.faces[idx.0].as_mut().expect("stale face index")
    }

    /// Set or clear a face payload handle.
    pub fn set_face_payload(&mut self, idx: FaceIdx, payload: Option<PayloadId>) {
        self.face_mut(idx).payload = payload;
    }

    // ALLOCATION

    pub(crate) fn alloc_vertex(&mut self, position: DVec3) -> VertexIdx {
        let vertex = Vertex {
            position,
            leaving: None,
        };
        if let Some(slot) = self.free_vertices.pop() {
            self.vertices[slot] = Some(vertex);
            VertexIdx(slot)
        } else {
            self.vertices.push(Some(vertex));
            VertexIdx(self.vertices.len() - 1)
        }
    }

    /// Allocates a half-edge whose twin/next/edge links are filled in later;
    /// until then they point at the half-edge itself.
    pub(crate) fn alloc_half_edge(&mut self, origin: VertexIdx) -> HalfEdgeIdx {
        let slot = if let Some(slot) = self.free_half_edges.pop() {
            slot
        } else {
            self.half_edges.push(None);
            self.half_edges.len() - 1
        };
        self.half_edges[slot] = Some(HalfEdge {
            origin,
            twin: HalfEdgeIdx(slot),
            next: HalfEdgeIdx(slot),
            face: None,
            edge: EdgeIdx(usize::MAX),
        });
        HalfEdgeIdx(slot)
    }

    pub(crate) fn alloc_edge(&mut self, first: HalfEdgeIdx, second: HalfEdgeIdx) -> EdgeIdx {
        let edge = Edge { first, second };
        if let Some(slot) = self.free_edges.pop() {
            self.edges[slot] = Some(edge);
            EdgeIdx(slot)
        } else {
            self.edges.push(Some(edge));
            EdgeIdx(self.edges.len() - 1)
        }
    }

    pub(crate) fn alloc_face(
        &mut self,
        boundary: HalfEdgeIdx,
        plane: Plane,
        payload: Option<PayloadId>,
    ) -> FaceIdx {
        let face = Face {
            boundary,
            plane,
            payload,
        };
        if let Some(slot) = self.free_faces.pop() {
            self.faces[slot] = Some(face);
            FaceIdx(slot)
        } else {
            self.faces.push(Some(face));
            FaceIdx(self.faces.len() - 1)
        }
    }

    pub(crate) fn free_vertex(&mut self, idx: VertexIdx) {
        debug_assert!(self.vertices[idx.0].is_some());
        self.vertices[idx.0] = None;
        self.free_vertices.push(idx.0);
    }

    pub(crate) fn free_half_edge(&mut self, idx: HalfEdgeIdx) {
        debug_assert!(self.half_edges[idx.0].is_some());
        self.half_edges[idx.0] = None;
        self.free_half_edges.push(idx.0);
    }

    pub(crate) fn free_edge(&mut self, idx: EdgeIdx) {
        debug_assert!(self.edges[idx.0].is_some());
        self.edges[idx.0] = None;
        self.free_edges.push(idx.0);
    }

    pub(crate) fn free_face(&mut self, idx: FaceIdx) {
        debug_assert!(self.faces[idx.0].is_some());
        self.faces[idx.0] = None;
        self.free_faces.push(idx.0);
    }

    /// Drop every element, returning to the empty state.
    pub(crate) fn clear(&mut self) {
        self.vertices.clear();
        self.half_edges.clear();
        self.edges.clear();
        self.faces.clear();
        self.free_vertices.clear();
        self.free_half_edges.clear();
        self.free_edges.clear();
        self.free_faces.clear();
    }

    // COUNTS AND STATE PREDICATES

    /// Number of live vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() - self.free_vertices.len()
    }

    /// Number of live edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len() - self.free_edges.len()
    }

    /// Number of live faces.
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len() - self.free_faces.len()
    }

    /// Contains nothing at all.
    #[must_use]
    pub fn empty(&self) -> bool {
        self.vertex_count() == 0
    }

    /// Degenerated to a single point.
    #[must_use]
    pub fn point(&self) -> bool {
        self.vertex_count() == 1
    }

    /// Degenerated to a single line segment.
    #[must_use]
    pub fn edge_state(&self) -> bool {
        self.vertex_count() == 2 && self.edge_count() == 1
    }

    /// Degenerated to a single planar polygon.
    #[must_use]
    pub fn polygon(&self) -> bool {
        self.face_count() == 1
    }

    /// A genuine 3D solid: at least four faces and watertight.
    #[must_use]
    pub fn polyhedron(&self) -> bool {
        self.face_count() >= 4 && self.closed()
    }

    /// Every half-edge has an incident face.
    #[must_use]
    pub fn closed(&self) -> bool {
        self.half_edges
            .iter()
            .flatten()
            .all(|half_edge| half_edge.face.is_some())
    }

    // ITERATION

    /// Indices of all live vertices.
    pub fn vertex_indices(&self) -> impl Iterator<Item = VertexIdx> + '_ {
        self.vertices
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|_| VertexIdx(i)))
    }

    /// Indices of all live edges.
    pub fn edge_indices(&self) -> impl Iterator<Item = EdgeIdx> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|_| EdgeIdx(i)))
    }

    /// Indices of all live faces.
    pub fn face_indices(&self) -> impl Iterator<Item = FaceIdx> + '_ {
        self.faces
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|_| FaceIdx(i)))
    }

    /// Positions of all live vertices.
    #[must_use]
    pub fn vertex_positions(&self) -> Vec<DVec3> {
        self.vertices
            .iter()
            .flatten()
            .map(|vertex| vertex.position)
            .collect()
    }

    /// Position of one vertex.
    #[inline]
    #[must_use]
    pub fn position(&self, idx: VertexIdx) -> DVec3 {
        self.vertex(idx).position
    }

    /// The vertex a half-edge points at.
    #[inline]
    pub(crate) fn destination(&self, h: HalfEdgeIdx) -> VertexIdx {
        self.half_edge(self.half_edge(h).twin).origin
    }

    /// Predecessor of `h` in its boundary cycle (linear walk; cycles are
    /// short).
    pub(crate) fn prev_in_face(&self, h: HalfEdgeIdx) -> HalfEdgeIdx {
        let mut current = h;
        loop {
            let next = self.half_edge(current).next;
            if next == h {
                return current;
            }
            current = next;
        }
    }

    /// The half-edges of a face boundary in cycle order.
    #[must_use]
    pub fn face_half_edges(&self, face: FaceIdx) -> Vec<HalfEdgeIdx> {
        let start = self.face(face).boundary;
        let mut result = vec![start];
        let mut current = self.half_edge(start).next;
        while current != start {
            result.push(current);
            current = self.half_edge(current).next;
        }
        result
    }

    /// Vertex positions around a face, counter-clockwise from outside.
    #[must_use]
    pub fn face_vertex_positions(&self, face: FaceIdx) -> Vec<DVec3> {
        self.face_half_edges(face)
            .into_iter()
            .map(|h| self.position(self.half_edge(h).origin))
            .collect()
    }

    /// Endpoints of an edge as a segment.
    #[must_use]
    pub fn edge_segment(&self, edge: EdgeIdx) -> Segment3 {
        let e = self.edge(edge);
        Segment3::new(
            self.position(self.half_edge(e.first).origin),
            self.position(self.half_edge(e.second).origin),
        )
    }

    /// Vertices adjacent to `vertex` through an edge.
    #[must_use]
    pub fn vertex_neighbors(&self, vertex: VertexIdx) -> Vec<VertexIdx> {
        let Some(start) = self.vertex(vertex).leaving else {
            return Vec::new();
        };
        let mut result = Vec::new();
        let mut current = start;
        loop {
            result.push(self.destination(current));
            // Rotate around the origin: twin gets us back, next leaves again.
            current = self.half_edge(self.half_edge(current).twin).next;
            if current == start {
                break;
            }
        }
        result
    }

    /// Half-edges leaving `vertex`, in rotation order.
    pub(crate) fn leaving_half_edges(&self, vertex: VertexIdx) -> Vec<HalfEdgeIdx> {
        let Some(start) = self.vertex(vertex).leaving else {
            return Vec::new();
        };
        let mut result = Vec::new();
        let mut current = start;
        loop {
            result.push(current);
            current = self.half_edge(self.half_edge(current).twin).next;
            if current == start {
                break;
            }
        }
        result
    }

    /// Faces incident to `vertex`.
    #[must_use]
    pub fn incident_faces(&self, vertex: VertexIdx) -> Vec<FaceIdx> {
        self.leaving_half_edges(vertex)
            .into_iter()
            .filter_map(|h| self.half_edge(h).face)
            .collect()
    }

    /// Smallest axis-aligned box containing all vertices.
    #[must_use]
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::from_points(self.vertices.iter().flatten().map(|vertex| vertex.position))
    }

    /// Applies an affine transform to every vertex and recomputes face
    /// planes from their (transformed) boundary loops.
    pub fn transform(&mut self, matrix: &glam::DMat4) {
        for slot in self.vertices.iter_mut().flatten() {
            slot.position = matrix.transform_point3(slot.position);
        }
        for face in self.face_indices().collect::<Vec<_>>() {
            let positions = self.face_vertex_positions(face);
            if let Some(plane) = plane_from_loop(&positions) {
                self.face_mut(face).plane = plane;
            }
        }
    }
}

/// Best-effort plane through a vertex loop: first non-collinear triple.
pub(crate) fn plane_from_loop(positions: &[DVec3]) -> Option<Plane> {
    let n = positions.len();
    if n < 3 {
        return None;
    }
    (1..n - 1).find_map(|i| Plane::from_points(positions[0], positions[i], positions[i + 1]))
}
