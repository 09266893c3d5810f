//! Brush faces: the payload a brush attaches to each facet of its
//! polyhedron.
//!
//! A face is defined by three non-collinear points (in plane winding
//! order), carries texture attributes and a texture coordinate system, and
//! holds a back-link to the geometry facet it currently decorates. The
//! crate does not render anything; the coordinate system is a trait seam
//! so a client can plug in its own projection while the kernel keeps it
//! consistent through edits.

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;

use glam::{DMat4, DVec2, DVec3};

use crate::error::GeometryError;
use crate::plane::Plane;
use crate::polyhedron::{FaceIdx, Polyhedron};

/// Texture alignment state of a face.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceAttributes {
    /// Name of the applied texture.
    pub texture_name: String,
    /// Texture offset in texels.
    pub offset: DVec2,
    /// Texture scale factors.
    pub scale: DVec2,
    /// Texture rotation in degrees.
    pub rotation: f64,
}

impl FaceAttributes {
    /// Attributes with the given texture and neutral alignment.
    #[must_use]
    pub fn with_texture(texture_name: impl Into<String>) -> Self {
        Self {
            texture_name: texture_name.into(),
            ..Self::default()
        }
    }
}

impl Default for FaceAttributes {
    fn default() -> Self {
        Self {
            texture_name: String::new(),
            offset: DVec2::ZERO,
            scale: DVec2::ONE,
            rotation: 0.0,
        }
    }
}

/// How a texture coordinate system follows a face onto a new plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WrapStyle {
    /// Project the old coordinate system onto the new plane.
    Projection,
    /// Rotate the old coordinate system onto the new plane.
    Rotation,
}

/// Opaque saved state of a [`TexCoordSystem`].
pub trait TexCoordSystemSnapshot {
    /// Downcast support for concrete systems.
    fn as_any(&self) -> &dyn Any;
}

/// Pluggable texture coordinate system of a face.
pub trait TexCoordSystem {
    /// Clones the system behind the trait object.
    fn clone_box(&self) -> Box<dyn TexCoordSystem>;

    /// Captures the current state.
    fn take_snapshot(&self) -> Box<dyn TexCoordSystemSnapshot>;

    /// Restores a previously captured state onto the given boundary.
    fn restore_snapshot(
        &mut self,
        snapshot: &dyn TexCoordSystemSnapshot,
        attributes: &FaceAttributes,
        boundary: &Plane,
        style: WrapStyle,
    );

    /// Follows the face through an affine transformation, updating the
    /// attributes so the texture stays visually in place when
    /// `lock_texture` is set.
    fn transform(
        &mut self,
        old_boundary: &Plane,
        new_boundary: &Plane,
        transformation: &DMat4,
        attributes: &mut FaceAttributes,
        lock_texture: bool,
    );

    /// Re-derives cached axes after the boundary changed without a known
    /// transformation.
    fn reset_cache(&mut self, attributes: &FaceAttributes, boundary: &Plane);
}

/// A coordinate system that carries no state; every hook is a no-op.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultTexCoordSystem;

struct DefaultSnapshot;

impl TexCoordSystemSnapshot for DefaultSnapshot {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl TexCoordSystem for DefaultTexCoordSystem {
    fn clone_box(&self) -> Box<dyn TexCoordSystem> {
        Box::new(*self)
    }

    fn take_snapshot(&self) -> Box<dyn TexCoordSystemSnapshot> {
        Box::new(DefaultSnapshot)
    }

    fn restore_snapshot(
        &mut self,
        _snapshot: &dyn TexCoordSystemSnapshot,
        _attributes: &FaceAttributes,
        _boundary: &Plane,
        _style: WrapStyle,
    ) {
    }

    fn transform(
        &mut self,
        _old_boundary: &Plane,
        _new_boundary: &Plane,
        _transformation: &DMat4,
        _attributes: &mut FaceAttributes,
        _lock_texture: bool,
    ) {
    }

    fn reset_cache(&mut self, _attributes: &FaceAttributes, _boundary: &Plane) {}
}

/// One textured face of a brush.
pub struct BrushFace {
    points: [DVec3; 3],
    boundary: Plane,
    attributes: FaceAttributes,
    tex_coord_system: Box<dyn TexCoordSystem>,
    geometry: Option<FaceIdx>,
}

impl BrushFace {
    /// Creates a face from three points in plane winding order
    /// (counter-clockwise seen from the outside).
    pub fn new(
        p0: DVec3,
        p1: DVec3,
        p2: DVec3,
        attributes: FaceAttributes,
        tex_coord_system: Box<dyn TexCoordSystem>,
    ) -> Result<Self, GeometryError> {
        let boundary = Plane::from_points(p0, p1, p2).ok_or(GeometryError::Invalid)?;
        Ok(Self {
            points: [p0, p1, p2],
            boundary,
            attributes,
            tex_coord_system,
            geometry: None,
        })
    }

    /// The three defining points.
    #[must_use]
    pub fn points(&self) -> [DVec3; 3] {
        self.points
    }

    /// The face plane, normal facing out of the brush.
    #[must_use]
    pub fn boundary(&self) -> Plane {
        self.boundary
    }

    /// Texture alignment state.
    #[must_use]
    pub fn attributes(&self) -> &FaceAttributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut FaceAttributes {
        &mut self.attributes
    }

    pub fn set_attributes(&mut self, attributes: FaceAttributes) {
        self.attributes = attributes;
    }

    /// The geometry facet this face currently decorates.
    #[must_use]
    pub fn geometry(&self) -> Option<FaceIdx> {
        self.geometry
    }

    pub fn set_geometry(&mut self, geometry: Option<FaceIdx>) {
        self.geometry = geometry;
    }

    /// The face's texture coordinate system.
    #[must_use]
    pub fn tex_coord_system(&self) -> &dyn TexCoordSystem {
        self.tex_coord_system.as_ref()
    }

    pub fn tex_coord_system_mut(&mut self) -> &mut dyn TexCoordSystem {
        self.tex_coord_system.as_mut()
    }

    /// Applies an affine transformation to the face.
    pub fn transform(&mut self, matrix: &DMat4, lock_texture: bool) -> Result<(), GeometryError> {
        let old_boundary = self.boundary;
        let points = self.points.map(|p| matrix.transform_point3(p));
        let boundary =
            Plane::from_points(points[0], points[1], points[2]).ok_or(GeometryError::Invalid)?;
        self.points = points;
        self.boundary = boundary;
        self.tex_coord_system.transform(
            &old_boundary,
            &boundary,
            matrix,
            &mut self.attributes,
            lock_texture,
        );
        Ok(())
    }

    /// Re-derives the defining points from the decorated geometry facet
    /// after its vertices moved.
    pub fn update_points_from_geometry(&mut self, poly: &Polyhedron) -> Result<(), GeometryError> {
        let face = self.geometry.ok_or(GeometryError::Invalid)?;
        let positions = poly.face_vertex_positions(face);
        let n = positions.len();
        // First non-collinear triple along the loop keeps the winding.
        let (i, plane) = (1..n - 1)
            .find_map(|i| {
                Plane::from_points(positions[0], positions[i], positions[i + 1]).map(|p| (i, p))
            })
            .ok_or(GeometryError::Invalid)?;
        self.points = [positions[0], positions[i], positions[i + 1]];
        self.boundary = plane;
        self.tex_coord_system
            .reset_cache(&self.attributes, &self.boundary);
        Ok(())
    }

    /// Applies a texture-lock transformation to the coordinate system only,
    /// leaving the face geometry alone. Used when the boundary has already
    /// been updated from rebuilt geometry and `matrix` describes how the
    /// face's reference points travelled.
    pub fn apply_uv_lock_transform(&mut self, old_boundary: &Plane, matrix: &DMat4) {
        let boundary = self.boundary;
        self.tex_coord_system.transform(
            old_boundary,
            &boundary,
            matrix,
            &mut self.attributes,
            true,
        );
    }

    /// Copies the texture attributes and coordinate system state from
    /// `source`. With [`WrapStyle::Projection`] the state is interpreted on
    /// the source boundary, with [`WrapStyle::Rotation`] it is wrapped onto
    /// this face's own boundary.
    pub fn clone_attributes_from(&mut self, source: &Self, style: WrapStyle) {
        let snapshot = source.tex_coord_system.take_snapshot();
        self.attributes = source.attributes.clone();
        let boundary = match style {
            WrapStyle::Projection => source.boundary,
            WrapStyle::Rotation => self.boundary,
        };
        self.tex_coord_system
            .restore_snapshot(snapshot.as_ref(), &self.attributes, &boundary, style);
    }
}

impl Clone for BrushFace {
    fn clone(&self) -> Self {
        Self {
            points: self.points,
            boundary: self.boundary,
            attributes: self.attributes.clone(),
            tex_coord_system: self.tex_coord_system.clone_box(),
            geometry: self.geometry,
        }
    }
}

impl fmt::Debug for BrushFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrushFace")
            .field("points", &self.points)
            .field("boundary", &self.boundary)
            .field("attributes", &self.attributes)
            .field("geometry", &self.geometry)
            .finish_non_exhaustive()
    }
}

/// Creates brush faces; lets clients inject their own texture coordinate
/// system into faces the kernel has to invent (e.g. subtraction caps).
pub trait ModelFactory {
    /// Creates a face from three points in plane winding order.
    fn create_face(
        &self,
        p0: DVec3,
        p1: DVec3,
        p2: DVec3,
        attributes: FaceAttributes,
    ) -> Result<BrushFace, GeometryError>;
}

/// Factory producing faces with the stateless default coordinate system.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultModelFactory;

impl ModelFactory for DefaultModelFactory {
    fn create_face(
        &self,
        p0: DVec3,
        p1: DVec3,
        p2: DVec3,
        attributes: FaceAttributes,
    ) -> Result<BrushFace, GeometryError> {
        BrushFace::new(p0, p1, p2, attributes, Box::new(DefaultTexCoordSystem))
    }
}

/// Sorts faces into the canonical plane order used when building geometry,
/// so equal face sets always clip in the same sequence: axial planes
/// before slanted ones, grouped by dominant axis and sign, ties broken by
/// the plane coefficients.
pub(crate) fn sort_faces(faces: &mut [BrushFace]) {
    faces.sort_by(|a, b| compare_planes(&a.boundary(), &b.boundary()));
}

fn compare_planes(a: &Plane, b: &Plane) -> Ordering {
    plane_weight(a.normal)
        .cmp(&plane_weight(b.normal))
        .then_with(|| a.normal.x.total_cmp(&b.normal.x))
        .then_with(|| a.normal.y.total_cmp(&b.normal.y))
        .then_with(|| a.normal.z.total_cmp(&b.normal.z))
        .then_with(|| a.offset.total_cmp(&b.offset))
}

fn plane_weight(normal: DVec3) -> usize {
    let abs = normal.abs();
    let axis = if abs.x >= abs.y && abs.x >= abs.z {
        0
    } else if abs.y >= abs.z {
        1
    } else {
        2
    };
    let axial = abs[axis] > 1.0 - 1e-10;
    let negative = normal[axis] < 0.0;
    let mut weight = axis * 2 + usize::from(negative);
    if !axial {
        weight += 6;
    }
    weight
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::almost_equal_vec;

    fn face(p0: DVec3, p1: DVec3, p2: DVec3) -> BrushFace {
        DefaultModelFactory
            .create_face(p0, p1, p2, FaceAttributes::default())
            .expect("valid face")
    }

    #[test]
    fn test_new_rejects_collinear_points() {
        let result = DefaultModelFactory.create_face(
            DVec3::ZERO,
            DVec3::X,
            DVec3::X * 5.0,
            FaceAttributes::default(),
        );
        assert_eq!(result.unwrap_err(), GeometryError::Invalid);
    }

    #[test]
    fn test_boundary_from_winding() {
        let f = face(DVec3::ZERO, DVec3::new(64.0, 0.0, 0.0), DVec3::new(0.0, 64.0, 0.0));
        assert!(almost_equal_vec(f.boundary().normal, DVec3::Z));
    }

    #[test]
    fn test_transform_moves_boundary() {
        let mut f = face(DVec3::ZERO, DVec3::new(64.0, 0.0, 0.0), DVec3::new(0.0, 64.0, 0.0));
        f.transform(&DMat4::from_translation(DVec3::Z * 16.0), false)
            .expect("translation is valid");
        assert!(almost_equal_vec(f.boundary().normal, DVec3::Z));
        assert!((f.boundary().offset - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_transform_rejects_flattening() {
        let mut f = face(DVec3::ZERO, DVec3::new(64.0, 0.0, 0.0), DVec3::new(0.0, 64.0, 0.0));
        let squash = DMat4::from_scale(DVec3::new(1.0, 0.0, 1.0));
        assert_eq!(f.transform(&squash, false).unwrap_err(), GeometryError::Invalid);
    }

    #[test]
    fn test_sort_is_canonical() {
        let mut a = vec![
            face(DVec3::ZERO, DVec3::Y, DVec3::X), // -Z
            face(DVec3::ZERO, DVec3::X, DVec3::Y), // +Z
            face(
                DVec3::ZERO,
                DVec3::new(0.0, 1.0, 0.0),
                DVec3::new(0.0, 0.0, 1.0),
            ), // +X
        ];
        let mut b: Vec<BrushFace> = a.iter().rev().cloned().collect();
        sort_faces(&mut a);
        sort_faces(&mut b);
        let planes_a: Vec<Plane> = a.iter().map(BrushFace::boundary).collect();
        let planes_b: Vec<Plane> = b.iter().map(BrushFace::boundary).collect();
        assert_eq!(planes_a, planes_b);
        // Axial +X sorts before +Z, slanted planes last.
        assert!(almost_equal_vec(planes_a[0].normal, DVec3::X));
    }
}
