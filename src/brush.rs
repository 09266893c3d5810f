//! # Brush
//!
//! A brush is a convex solid defined by its textured faces. The face planes
//! are the authority: geometry is (re)built by clipping a seed cuboid
//! spanning the world bounds with every face plane in canonical order, and
//! each facet of the resulting polyhedron must be covered by exactly one
//! face.
//!
//! ## Editing Model
//!
//! Every mutating operation is candidate-then-commit: it derives a
//! candidate face list, rebuilds geometry from it, and only replaces the
//! brush's state when the rebuild produced a valid, fully specified solid.
//! A failed edit returns an error and leaves the brush untouched.
//!
//! Topological edits (vertex, edge and face moves, snapping, vertex
//! insertion and removal) address elements by *position*. They build the
//! edited polyhedron from points, then use [`PolyhedronMatcher`] to decide
//! which old face each new facet descends from, so texture attributes
//! follow the surface through the rebuild.

use glam::{DMat4, DVec3};
use tracing::{debug, warn};

use crate::bbox::BoundingBox;
use crate::error::GeometryError;
use crate::face::{BrushFace, FaceAttributes, ModelFactory, WrapStyle, sort_faces};
use crate::math::{
    EPSILON, Polygon3, Segment3, almost_equal_vec, almost_zero_vec, points_transformation_matrix,
    polygon_vertices, segment_vertices,
};
use crate::matcher::PolyhedronMatcher;
use crate::plane::{Plane, PointStatus};
use crate::polyhedron::{ClipResult, FaceIdx, GeometryCallback, Polyhedron};
use crate::spatial_hash::{PositionMap, PositionSet};

/// A convex textured solid.
#[derive(Clone, Debug)]
pub struct Brush {
    faces: Vec<BrushFace>,
    geometry: Polyhedron,
}

impl Brush {
    /// Builds a brush from faces. Fails if the planes enclose no volume
    /// ([`GeometryError::Empty`]), healing destroys the solid
    /// ([`GeometryError::Invalid`]), or part of the surface is covered by
    /// no face ([`GeometryError::NotFullySpecified`]).
    pub fn new(world_bounds: &BoundingBox, faces: Vec<BrushFace>) -> Result<Self, GeometryError> {
        let (geometry, faces) = build_geometry(world_bounds, faces)?;
        Ok(Self { faces, geometry })
    }

    /// The faces, in canonical plane order.
    #[must_use]
    pub fn faces(&self) -> &[BrushFace] {
        &self.faces
    }

    /// Number of faces.
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// The underlying polyhedron.
    #[must_use]
    pub fn geometry(&self) -> &Polyhedron {
        &self.geometry
    }

    /// Axis-aligned bounds of the brush.
    #[must_use]
    pub fn bounds(&self) -> BoundingBox {
        self.geometry.bounds()
    }

    /// All vertex positions.
    #[must_use]
    pub fn vertex_positions(&self) -> Vec<DVec3> {
        self.geometry.vertex_positions()
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.geometry.vertex_count()
    }

    /// Returns `true` if a vertex lies at `position`.
    #[must_use]
    pub fn has_vertex(&self, position: DVec3) -> bool {
        self.geometry.has_vertex(position)
    }

    /// Returns `true` if an edge connects the segment's endpoints.
    #[must_use]
    pub fn has_edge(&self, segment: &Segment3) -> bool {
        self.geometry.has_edge(segment)
    }

    /// Returns `true` if a facet matches the polygon boundary.
    #[must_use]
    pub fn has_face(&self, polygon: &Polygon3) -> bool {
        self.geometry.has_face(polygon)
    }

    /// Returns `true` if the point is inside or on the brush.
    #[must_use]
    pub fn contains_point(&self, point: DVec3) -> bool {
        self.geometry.contains_point(point)
    }

    /// Returns `true` if `other` lies entirely inside this brush.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.bounds().contains_bbox(&other.bounds()) && self.geometry.contains(&other.geometry)
    }

    /// Returns `true` if the brushes overlap.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.geometry.intersects(&other.geometry)
    }

    /// Returns `true` if every facet is linked to a face and back. Holds
    /// for every brush a successful build or edit produces.
    #[must_use]
    pub fn fully_specified(&self) -> bool {
        self.geometry.face_indices().all(|f| {
            self.geometry
                .face(f)
                .payload
                .and_then(|i| self.faces.get(i))
                .is_some_and(|face| face.geometry() == Some(f))
        })
    }

    // VERTEX, EDGE AND FACE MOVES

    /// Returns `true` if the given vertices can be moved by `delta`.
    #[must_use]
    pub fn can_move_vertices(
        &self,
        world_bounds: &BoundingBox,
        positions: &[DVec3],
        delta: DVec3,
    ) -> bool {
        self.do_can_move_vertices(world_bounds, positions, delta, true)
            .is_some()
    }

    /// Moves the vertices at `positions` by `delta`, merging or removing
    /// vertices as the hull demands. Returns the new positions of the moved
    /// vertices that still exist afterwards.
    pub fn move_vertices(
        &mut self,
        world_bounds: &BoundingBox,
        positions: &[DVec3],
        delta: DVec3,
        uv_lock: bool,
    ) -> Result<Vec<DVec3>, GeometryError> {
        let result = self
            .do_can_move_vertices(world_bounds, positions, delta, true)
            .ok_or(GeometryError::Invalid)?;
        self.set_new_geometry_moved(world_bounds, &result, positions, delta, uv_lock)?;
        Ok(positions
            .iter()
            .map(|&p| p + delta)
            .filter(|&q| self.geometry.has_vertex(q))
            .collect())
    }

    /// Returns `true` if the given edges can be moved by `delta` without
    /// losing any of them.
    #[must_use]
    pub fn can_move_edges(
        &self,
        world_bounds: &BoundingBox,
        segments: &[Segment3],
        delta: DVec3,
    ) -> bool {
        let positions = segment_vertices(segments);
        self.do_can_move_vertices(world_bounds, &positions, delta, false)
            .is_some_and(|result| {
                segments
                    .iter()
                    .all(|s| result.has_edge(&s.translated(delta)))
            })
    }

    /// Moves whole edges by `delta`. Unlike a vertex move, every moved edge
    /// must survive the move. Returns the translated segments.
    pub fn move_edges(
        &mut self,
        world_bounds: &BoundingBox,
        segments: &[Segment3],
        delta: DVec3,
        uv_lock: bool,
    ) -> Result<Vec<Segment3>, GeometryError> {
        let positions = segment_vertices(segments);
        let result = self
            .do_can_move_vertices(world_bounds, &positions, delta, false)
            .ok_or(GeometryError::Invalid)?;
        let translated: Vec<Segment3> = segments.iter().map(|s| s.translated(delta)).collect();
        if !translated.iter().all(|s| result.has_edge(s)) {
            return Err(GeometryError::Invalid);
        }
        self.set_new_geometry_moved(world_bounds, &result, &positions, delta, uv_lock)?;
        Ok(translated)
    }

    /// Returns `true` if the given facets can be moved by `delta` without
    /// losing any of them.
    #[must_use]
    pub fn can_move_faces(
        &self,
        world_bounds: &BoundingBox,
        polygons: &[Polygon3],
        delta: DVec3,
    ) -> bool {
        let positions = polygon_vertices(polygons);
        self.do_can_move_vertices(world_bounds, &positions, delta, false)
            .is_some_and(|result| {
                polygons
                    .iter()
                    .all(|p| result.has_face(&p.translated(delta)))
            })
    }

    /// Moves whole facets by `delta`; every moved facet must survive.
    /// Returns the translated polygons.
    pub fn move_faces(
        &mut self,
        world_bounds: &BoundingBox,
        polygons: &[Polygon3],
        delta: DVec3,
        uv_lock: bool,
    ) -> Result<Vec<Polygon3>, GeometryError> {
        let positions = polygon_vertices(polygons);
        let result = self
            .do_can_move_vertices(world_bounds, &positions, delta, false)
            .ok_or(GeometryError::Invalid)?;
        let translated: Vec<Polygon3> = polygons.iter().map(|p| p.translated(delta)).collect();
        if !translated.iter().all(|p| result.has_face(p)) {
            return Err(GeometryError::Invalid);
        }
        self.set_new_geometry_moved(world_bounds, &result, &positions, delta, uv_lock)?;
        Ok(translated)
    }

    /// Decides whether the vertices at `positions` can move by `delta` and
    /// returns the resulting polyhedron if so.
    ///
    /// The possible interactions of the moving part and the remaining part
    /// range from trivial (the whole brush moves) to subtle (the moving
    /// vertices sweep through a face of the remaining solid). The checks
    /// run in order of increasing cost: degenerate inputs, world bounds,
    /// whole-brush translation, vertex survival, convexity of the result,
    /// cheap shape-pair acceptances, and finally the sweep test against
    /// the faces of the remaining fragment (with the roles inverted when
    /// the remaining part is the lower-dimensional one).
    fn do_can_move_vertices(
        &self,
        world_bounds: &BoundingBox,
        positions: &[DVec3],
        delta: DVec3,
        allow_vertex_removal: bool,
    ) -> Option<Polyhedron> {
        if positions.is_empty() || almost_zero_vec(delta) {
            return None;
        }
        if !positions.iter().all(|&p| self.geometry.has_vertex(p)) {
            return None;
        }

        let moving_set = PositionSet::from_positions(EPSILON, positions.iter().copied());
        let mut remaining = Polyhedron::new();
        let mut moving = Polyhedron::new();
        let mut result = Polyhedron::new();
        for p in self.geometry.vertex_positions() {
            if moving_set.contains(p) {
                moving.add_point(p);
                result.add_point(p + delta);
            } else {
                remaining.add_point(p);
                result.add_point(p);
            }
        }

        if !world_bounds.contains_bbox(&result.bounds()) {
            return None;
        }
        if moving.vertex_count() == self.geometry.vertex_count() {
            return Some(result);
        }
        if !allow_vertex_removal {
            for &p in positions {
                if !result.has_vertex(p + delta) {
                    return None;
                }
            }
        }
        if !result.polyhedron() {
            return None;
        }

        if (moving.point() && remaining.polygon())
            || (moving.edge_state() && remaining.edge_state())
        {
            return Some(result);
        }

        let (stationary, sweep_positions, sweep_delta) = if remaining.point()
            || remaining.edge_state()
            || (remaining.polygon() && moving.polyhedron())
        {
            // The remaining part is the lower-dimensional one; check the
            // sweep from its perspective instead.
            (&moving, remaining.vertex_positions(), -delta)
        } else {
            (&remaining, moving.vertex_positions(), delta)
        };
        sweep_is_clear(stationary, &sweep_positions, sweep_delta).then_some(result)
    }

    /// Commits `new_geometry` as the brush's shape, transplanting face
    /// payloads through a matcher aware of the moved vertices.
    fn set_new_geometry_moved(
        &mut self,
        world_bounds: &BoundingBox,
        new_geometry: &Polyhedron,
        moved: &[DVec3],
        delta: DVec3,
        uv_lock: bool,
    ) -> Result<(), GeometryError> {
        let candidate = {
            let matcher =
                PolyhedronMatcher::with_moved_vertices(&self.geometry, new_geometry, moved, delta);
            faces_from_matcher(&self.faces, &matcher, uv_lock)?
        };
        self.commit(world_bounds, candidate)
    }

    fn commit(
        &mut self,
        world_bounds: &BoundingBox,
        candidate: Vec<BrushFace>,
    ) -> Result<(), GeometryError> {
        let (geometry, faces) = build_geometry(world_bounds, candidate)?;
        self.geometry = geometry;
        self.faces = faces;
        Ok(())
    }

    // VERTEX INSERTION, REMOVAL AND SNAPPING

    /// Returns `true` if a new vertex can be added at `position`.
    #[must_use]
    pub fn can_add_vertex(&self, world_bounds: &BoundingBox, position: DVec3) -> bool {
        world_bounds.contains_point(position) && !self.geometry.contains_point(position)
    }

    /// Extends the brush hull to include a new vertex at `position`.
    pub fn add_vertex(
        &mut self,
        world_bounds: &BoundingBox,
        position: DVec3,
    ) -> Result<(), GeometryError> {
        if !self.can_add_vertex(world_bounds, position) {
            return Err(GeometryError::Invalid);
        }
        let mut new_geometry = self.geometry.clone();
        if !new_geometry.add_point(position) {
            return Err(GeometryError::Invalid);
        }
        let candidate = {
            let matcher = PolyhedronMatcher::new(&self.geometry, &new_geometry);
            faces_from_matcher(&self.faces, &matcher, false)?
        };
        self.commit(world_bounds, candidate)
    }

    /// Returns `true` if the vertices at `positions` can be removed and
    /// still leave a valid solid.
    #[must_use]
    pub fn can_remove_vertices(&self, world_bounds: &BoundingBox, positions: &[DVec3]) -> bool {
        let _ = world_bounds;
        positions.iter().all(|&p| self.geometry.has_vertex(p))
            && self.remaining_polyhedron(positions).polyhedron()
    }

    /// Removes the vertices at `positions`, re-closing the hull over the
    /// remaining ones.
    pub fn remove_vertices(
        &mut self,
        world_bounds: &BoundingBox,
        positions: &[DVec3],
        uv_lock: bool,
    ) -> Result<(), GeometryError> {
        if !positions.iter().all(|&p| self.geometry.has_vertex(p)) {
            return Err(GeometryError::Invalid);
        }
        let new_geometry = self.remaining_polyhedron(positions);
        if !new_geometry.polyhedron() {
            return Err(GeometryError::Invalid);
        }
        let candidate = {
            let matcher = PolyhedronMatcher::new(&self.geometry, &new_geometry);
            faces_from_matcher(&self.faces, &matcher, uv_lock)?
        };
        self.commit(world_bounds, candidate)
    }

    fn remaining_polyhedron(&self, removed: &[DVec3]) -> Polyhedron {
        let removed_set = PositionSet::from_positions(EPSILON, removed.iter().copied());
        Polyhedron::from_points(
            self.geometry
                .vertex_positions()
                .into_iter()
                .filter(|&p| !removed_set.contains(p)),
        )
    }

    /// Returns `true` if snapping every vertex to the given grid size
    /// leaves a valid solid.
    #[must_use]
    pub fn can_snap_vertices(&self, world_bounds: &BoundingBox, snap: f64) -> bool {
        snap > 0.0
            && self
                .snapped_polyhedron(snap)
                .is_some_and(|(p, _)| p.polyhedron() && world_bounds.contains_bbox(&p.bounds()))
    }

    /// Snaps every vertex to the given grid size, merging vertices that
    /// land on the same grid point.
    pub fn snap_vertices(
        &mut self,
        world_bounds: &BoundingBox,
        snap: f64,
        uv_lock: bool,
    ) -> Result<(), GeometryError> {
        let (new_geometry, mapping) = self
            .snapped_polyhedron(snap)
            .ok_or(GeometryError::Invalid)?;
        if !new_geometry.polyhedron() || !world_bounds.contains_bbox(&new_geometry.bounds()) {
            return Err(GeometryError::Invalid);
        }
        let candidate = {
            let matcher =
                PolyhedronMatcher::with_vertex_mapping(&self.geometry, &new_geometry, &mapping);
            faces_from_matcher(&self.faces, &matcher, uv_lock)?
        };
        self.commit(world_bounds, candidate)
    }

    fn snapped_polyhedron(&self, snap: f64) -> Option<(Polyhedron, PositionMap<DVec3>)> {
        if snap <= 0.0 {
            return None;
        }
        let mut mapping = PositionMap::new(EPSILON);
        let mut snapped = Polyhedron::new();
        for p in self.geometry.vertex_positions() {
            let q = (p / snap).round() * snap;
            snapped.add_point(q);
            mapping.insert(p, q);
        }
        Some((snapped, mapping))
    }

    // PLANE-LEVEL EDITS

    /// Returns `true` if the given face's plane can be translated by
    /// `delta` without destroying the brush or losing a face.
    #[must_use]
    pub fn can_move_boundary(
        &self,
        world_bounds: &BoundingBox,
        face_index: usize,
        delta: DVec3,
    ) -> bool {
        self.boundary_moved_candidate(world_bounds, face_index, delta, false)
            .is_ok()
    }

    /// Translates one face's plane by `delta`, letting the neighbouring
    /// faces grow or shrink to fit. This is the resize operation: unlike a
    /// face move it does not care which vertices survive, only that the
    /// brush stays valid and keeps all its faces.
    pub fn move_boundary(
        &mut self,
        world_bounds: &BoundingBox,
        face_index: usize,
        delta: DVec3,
        lock_texture: bool,
    ) -> Result<(), GeometryError> {
        let (geometry, faces) =
            self.boundary_moved_candidate(world_bounds, face_index, delta, lock_texture)?;
        self.geometry = geometry;
        self.faces = faces;
        Ok(())
    }

    fn boundary_moved_candidate(
        &self,
        world_bounds: &BoundingBox,
        face_index: usize,
        delta: DVec3,
        lock_texture: bool,
    ) -> Result<(Polyhedron, Vec<BrushFace>), GeometryError> {
        if face_index >= self.faces.len() {
            return Err(GeometryError::Invalid);
        }
        let mut candidate = self.faces.clone();
        candidate[face_index].transform(&DMat4::from_translation(delta), lock_texture)?;
        let (geometry, faces) = build_geometry(world_bounds, candidate)?;
        if faces.len() != self.faces.len() || !world_bounds.contains_bbox(&geometry.bounds()) {
            return Err(GeometryError::Invalid);
        }
        Ok((geometry, faces))
    }

    /// Returns `true` if the brush can be expanded (or shrunk, for
    /// negative `delta`) by moving every face plane along its normal.
    #[must_use]
    pub fn can_expand(&self, world_bounds: &BoundingBox, delta: f64, lock_texture: bool) -> bool {
        self.expanded_candidate(world_bounds, delta, lock_texture)
            .is_ok()
    }

    /// Moves every face plane outward along its normal by `delta`.
    pub fn expand(
        &mut self,
        world_bounds: &BoundingBox,
        delta: f64,
        lock_texture: bool,
    ) -> Result<(), GeometryError> {
        let (geometry, faces) = self.expanded_candidate(world_bounds, delta, lock_texture)?;
        self.geometry = geometry;
        self.faces = faces;
        Ok(())
    }

    fn expanded_candidate(
        &self,
        world_bounds: &BoundingBox,
        delta: f64,
        lock_texture: bool,
    ) -> Result<(Polyhedron, Vec<BrushFace>), GeometryError> {
        let mut candidate = self.faces.clone();
        for face in &mut candidate {
            let shift = face.boundary().normal * delta;
            face.transform(&DMat4::from_translation(shift), lock_texture)?;
        }
        let (geometry, faces) = build_geometry(world_bounds, candidate)?;
        if !world_bounds.contains_bbox(&geometry.bounds()) {
            return Err(GeometryError::Invalid);
        }
        Ok((geometry, faces))
    }

    /// Cuts the brush with a new face, keeping the part behind its plane.
    pub fn clip(&mut self, world_bounds: &BoundingBox, face: BrushFace) -> Result<(), GeometryError> {
        let mut candidate = self.faces.clone();
        candidate.push(face);
        self.commit(world_bounds, candidate)
    }

    // WHOLE-BRUSH OPERATIONS

    /// Returns `true` if the transformation keeps the brush valid and
    /// inside the world bounds.
    #[must_use]
    pub fn can_transform(
        &self,
        world_bounds: &BoundingBox,
        transformation: &DMat4,
        lock_textures: bool,
    ) -> bool {
        self.transformed_candidate(world_bounds, transformation, lock_textures)
            .is_ok()
    }

    /// Applies an affine transformation to the brush.
    pub fn transform(
        &mut self,
        world_bounds: &BoundingBox,
        transformation: &DMat4,
        lock_textures: bool,
    ) -> Result<(), GeometryError> {
        let (geometry, faces) =
            self.transformed_candidate(world_bounds, transformation, lock_textures)?;
        self.geometry = geometry;
        self.faces = faces;
        Ok(())
    }

    fn transformed_candidate(
        &self,
        world_bounds: &BoundingBox,
        transformation: &DMat4,
        lock_textures: bool,
    ) -> Result<(Polyhedron, Vec<BrushFace>), GeometryError> {
        let mut candidate = self.faces.clone();
        for face in &mut candidate {
            face.transform(transformation, lock_textures)?;
        }
        let (geometry, faces) = build_geometry(world_bounds, candidate)?;
        if !world_bounds.contains_bbox(&geometry.bounds()) {
            return Err(GeometryError::Invalid);
        }
        Ok((geometry, faces))
    }

    /// Carves the subtrahends out of this brush, returning the convex
    /// pieces that remain. Fragment faces coplanar with an original face
    /// inherit its attributes; faces exposed by a subtrahend inherit the
    /// attributes of the subtrahend face they mirror; everything else gets
    /// `default_texture`. Degenerate fragments are dropped.
    #[must_use]
    pub fn subtract(
        &self,
        factory: &dyn ModelFactory,
        world_bounds: &BoundingBox,
        default_texture: &str,
        subtrahends: &[&Self],
    ) -> Vec<Self> {
        let mut fragments = vec![self.geometry.clone()];
        for subtrahend in subtrahends {
            fragments = fragments
                .iter()
                .flat_map(|f| f.subtract(&subtrahend.geometry))
                .collect();
        }

        let mut result = Vec::with_capacity(fragments.len());
        for fragment in &fragments {
            match self.brush_from_fragment(
                factory,
                world_bounds,
                default_texture,
                fragment,
                subtrahends,
            ) {
                Ok(brush) => result.push(brush),
                Err(error) => warn!(%error, "dropping degenerate subtraction fragment"),
            }
        }
        result
    }

    fn brush_from_fragment(
        &self,
        factory: &dyn ModelFactory,
        world_bounds: &BoundingBox,
        default_texture: &str,
        fragment: &Polyhedron,
        subtrahends: &[&Self],
    ) -> Result<Self, GeometryError> {
        let mut faces = Vec::new();
        for facet in fragment.face_indices() {
            let positions = fragment.face_vertex_positions(facet);
            let [p0, p1, p2] = defining_points(&positions).ok_or(GeometryError::Invalid)?;
            let mut face = factory.create_face(
                p0,
                p1,
                p2,
                FaceAttributes::with_texture(default_texture),
            )?;

            let plane = face.boundary();
            let flipped = plane.flipped();
            if let Some(source) = self
                .faces
                .iter()
                .chain(subtrahends.iter().flat_map(|b| b.faces.iter()))
                .find(|source| source.boundary().almost_equal(&plane))
            {
                face.clone_attributes_from(source, WrapStyle::Projection);
            } else if let Some(source) = subtrahends
                .iter()
                .flat_map(|b| b.faces.iter())
                .find(|source| source.boundary().almost_equal(&flipped))
            {
                face.clone_attributes_from(source, WrapStyle::Rotation);
            }
            faces.push(face);
        }
        Self::new(world_bounds, faces)
    }

    /// Intersects this brush with another by adopting its faces. Fails
    /// with [`GeometryError::Empty`] if the brushes do not overlap.
    pub fn intersect(
        &mut self,
        world_bounds: &BoundingBox,
        other: &Self,
    ) -> Result<(), GeometryError> {
        let mut candidate = self.faces.clone();
        candidate.extend(other.faces.iter().cloned());
        self.commit(world_bounds, candidate)
    }
}

/// A sweeping vertex must not pass through the stationary fragment: for
/// every fragment face it crosses (starting inside, ending outside), the
/// travel ray must miss the face's interior.
fn sweep_is_clear(stationary: &Polyhedron, moving: &[DVec3], delta: DVec3) -> bool {
    let direction = delta.normalize();
    moving.iter().all(|&p| {
        let destination = p + delta;
        stationary.face_indices().all(|f| {
            let plane = stationary.face(f).plane;
            plane.point_status(p) != PointStatus::Below
                || plane.point_status(destination) != PointStatus::Above
                || stationary.intersect_face_with_ray(f, p, direction).is_none()
        })
    })
}

/// Picks three non-collinear loop positions preserving the winding.
fn defining_points(positions: &[DVec3]) -> Option<[DVec3; 3]> {
    let n = positions.len();
    (1..n.checked_sub(1)?).find_map(|i| {
        Plane::from_points(positions[0], positions[i], positions[i + 1])
            .map(|_| [positions[0], positions[i], positions[i + 1]])
    })
}

// GEOMETRY CONSTRUCTION

/// Keeps the face store synchronized while a face plane clips the
/// geometry: the cap gets the face being added, split-off parts get their
/// own store entry, and deleted facets retire theirs.
struct AddFaceCallback<'a> {
    store: &'a mut Vec<Option<BrushFace>>,
    adding: usize,
}

impl GeometryCallback for AddFaceCallback<'_> {
    fn face_was_created(&mut self, poly: &mut Polyhedron, face: FaceIdx) {
        poly.set_face_payload(face, Some(self.adding));
    }

    fn face_was_split(&mut self, poly: &mut Polyhedron, original: FaceIdx, clone: FaceIdx) {
        if let Some(pid) = poly.face(original).payload {
            self.store.push(self.store[pid].clone());
            poly.set_face_payload(clone, Some(self.store.len() - 1));
        }
    }

    fn face_will_be_deleted(&mut self, poly: &mut Polyhedron, face: FaceIdx) {
        if let Some(pid) = poly.face(face).payload {
            self.store[pid] = None;
        }
    }
}

/// Retires store entries for faces healing destroys.
struct RetirePayloadCallback<'a> {
    store: &'a mut Vec<Option<BrushFace>>,
}

impl GeometryCallback for RetirePayloadCallback<'_> {
    fn face_will_be_deleted(&mut self, poly: &mut Polyhedron, face: FaceIdx) {
        if let Some(pid) = poly.face(face).payload {
            self.store[pid] = None;
        }
    }

    fn faces_will_be_merged(&mut self, poly: &mut Polyhedron, _remaining: FaceIdx, to_delete: FaceIdx) {
        if let Some(pid) = poly.face(to_delete).payload {
            self.store[pid] = None;
        }
    }
}

/// Builds brush geometry from a face list: sorts the faces into canonical
/// plane order, clips a seed cuboid spanning the world bounds by each face
/// plane, snaps and heals the result, and re-links faces to the facets
/// they cover. Faces whose plane never cut anything are dropped as
/// redundant.
fn build_geometry(
    world_bounds: &BoundingBox,
    mut faces: Vec<BrushFace>,
) -> Result<(Polyhedron, Vec<BrushFace>), GeometryError> {
    sort_faces(&mut faces);
    let mut geometry = Polyhedron::cuboid(&world_bounds.expanded(1.0));
    let count = faces.len();
    let mut store: Vec<Option<BrushFace>> = faces.into_iter().map(Some).collect();

    for i in 0..count {
        let Some(face) = store[i].as_ref() else {
            continue;
        };
        let plane = face.boundary();
        let mut cb = AddFaceCallback {
            store: &mut store,
            adding: i,
        };
        if geometry.clip(&plane, &mut cb) == ClipResult::Empty {
            return Err(GeometryError::Empty);
        }
    }
    if !geometry.polyhedron() {
        return Err(GeometryError::Empty);
    }

    geometry.correct_vertex_positions();
    let mut retire = RetirePayloadCallback { store: &mut store };
    if !geometry.heal_edges(&mut retire) {
        warn!("brush geometry did not survive healing");
        return Err(GeometryError::Invalid);
    }

    let mut result = Vec::new();
    for facet in geometry.face_indices().collect::<Vec<_>>() {
        let pid = geometry
            .face(facet)
            .payload
            .ok_or(GeometryError::NotFullySpecified)?;
        let mut face = store[pid].take().ok_or(GeometryError::NotFullySpecified)?;
        geometry.set_face_payload(facet, Some(result.len()));
        face.set_geometry(Some(facet));
        result.push(face);
    }

    let dropped = store.iter().flatten().count();
    if dropped > 0 {
        debug!(dropped, "dropped redundant faces");
    }
    Ok((geometry, result))
}

/// Derives the face list of a rebuilt polyhedron by transplanting each old
/// face onto the new facet the matcher assigns it to.
fn faces_from_matcher(
    old_faces: &[BrushFace],
    matcher: &PolyhedronMatcher<'_>,
    uv_lock: bool,
) -> Result<Vec<BrushFace>, GeometryError> {
    let mut collected = Vec::new();
    let mut error = None;
    matcher.process_right_faces(|left, right| {
        if error.is_some() {
            return;
        }
        let Some(pid) = left.and_then(|l| matcher.left().face(l).payload) else {
            error = Some(GeometryError::NotFullySpecified);
            return;
        };
        let mut face = old_faces[pid].clone();
        let old_boundary = face.boundary();
        face.set_geometry(Some(right));
        if let Err(e) = face.update_points_from_geometry(matcher.right()) {
            error = Some(e);
            return;
        }
        if uv_lock
            && let Some(left_face) = left
            && let Some(transform) = uv_lock_transform(matcher, left_face, right)
        {
            face.apply_uv_lock_transform(&old_boundary, &transform);
        }
        face.set_geometry(None);
        collected.push(face);
    });
    match error {
        Some(error) => Err(error),
        None => Ok(collected),
    }
}

/// Finds the affine transform describing how a face's reference points
/// travelled from the old facet to the new one, for texture locking.
///
/// Unmoved vertex pairs anchor the solve; if three or more vertices did
/// not move the texture cannot have moved either and no transform is
/// needed. Returns `None` when fewer than three independent reference
/// points exist or the solve degenerates.
fn uv_lock_transform(
    matcher: &PolyhedronMatcher<'_>,
    left: FaceIdx,
    right: FaceIdx,
) -> Option<DMat4> {
    let mut unmoved: Vec<(DVec3, DVec3)> = Vec::new();
    let mut moved: Vec<(DVec3, DVec3)> = Vec::new();
    matcher.visit_matching_vertex_pairs(left, right, |l, r| {
        let old = matcher.left().position(l);
        let new = matcher.right().position(r);
        let bucket = if almost_equal_vec(old, new) {
            &mut unmoved
        } else {
            &mut moved
        };
        if !bucket
            .iter()
            .any(|&(o, n)| almost_equal_vec(o, old) && almost_equal_vec(n, new))
        {
            bucket.push((old, new));
        }
    });
    if unmoved.len() >= 3 {
        return None;
    }

    let mut refs = unmoved;
    refs.extend(moved);
    let mut selected: Vec<(DVec3, DVec3)> = Vec::new();
    for (old, new) in refs {
        if selected.iter().any(|&(o, _)| almost_equal_vec(o, old)) {
            continue;
        }
        if selected.len() < 2 {
            selected.push((old, new));
        } else {
            let u = selected[1].0 - selected[0].0;
            let v = old - selected[0].0;
            if u.cross(v).length_squared() > EPSILON * EPSILON {
                selected.push((old, new));
                break;
            }
        }
    }
    if selected.len() < 3 {
        return None;
    }
    points_transformation_matrix(
        [selected[0].0, selected[1].0, selected[2].0],
        [selected[0].1, selected[1].1, selected[2].1],
    )
}
