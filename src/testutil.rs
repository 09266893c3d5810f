//! Shared fixtures for the brush tests.

use std::any::Any;

use glam::{DMat4, DVec2, DVec3};

use crate::bbox::BoundingBox;
use crate::brush::Brush;
use crate::face::{
    BrushFace, FaceAttributes, TexCoordSystem, TexCoordSystemSnapshot, WrapStyle,
};
use crate::plane::Plane;

/// World bounds large enough for every fixture.
pub(crate) fn world_bounds() -> BoundingBox {
    BoundingBox::cube(4096.0)
}

/// A texture coordinate system that records locked translations in the
/// face's offset attribute, so tests can observe texture locking without a
/// real projection.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct TrackingTexCoordSystem;

struct TrackingSnapshot;

impl TexCoordSystemSnapshot for TrackingSnapshot {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl TexCoordSystem for TrackingTexCoordSystem {
    fn clone_box(&self) -> Box<dyn TexCoordSystem> {
        Box::new(*self)
    }

    fn take_snapshot(&self) -> Box<dyn TexCoordSystemSnapshot> {
        Box::new(TrackingSnapshot)
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
        transformation: &DMat4,
        attributes: &mut FaceAttributes,
        lock_texture: bool,
    ) {
        if lock_texture {
            let t = transformation.w_axis;
            attributes.offset += DVec2::new(t.x, t.y);
        }
    }

    fn reset_cache(&mut self, _attributes: &FaceAttributes, _boundary: &Plane) {}
}

/// The six faces of an axis-aligned cuboid, textured by side name and
/// wired to a [`TrackingTexCoordSystem`].
pub(crate) fn cuboid_faces(bounds: &BoundingBox) -> Vec<BrushFace> {
    let (a, b) = (bounds.min, bounds.max);
    let sides: [(&str, [DVec3; 3]); 6] = [
        (
            "bottom",
            [
                DVec3::new(a.x, a.y, a.z),
                DVec3::new(a.x, b.y, a.z),
                DVec3::new(b.x, b.y, a.z),
            ],
        ),
        (
            "top",
            [
                DVec3::new(a.x, a.y, b.z),
                DVec3::new(b.x, a.y, b.z),
                DVec3::new(b.x, b.y, b.z),
            ],
        ),
        (
            "front",
            [
                DVec3::new(a.x, a.y, a.z),
                DVec3::new(b.x, a.y, a.z),
                DVec3::new(b.x, a.y, b.z),
            ],
        ),
        (
            "back",
            [
                DVec3::new(a.x, b.y, a.z),
                DVec3::new(a.x, b.y, b.z),
                DVec3::new(b.x, b.y, b.z),
            ],
        ),
        (
            "left",
            [
                DVec3::new(a.x, a.y, a.z),
                DVec3::new(a.x, a.y, b.z),
                DVec3::new(a.x, b.y, b.z),
            ],
        ),
        (
            "right",
            [
                DVec3::new(b.x, a.y, a.z),
                DVec3::new(b.x, b.y, a.z),
                DVec3::new(b.x, b.y, b.z),
            ],
        ),
    ];

    sides
        .into_iter()
        .map(|(texture, [p0, p1, p2])| {
            BrushFace::new(
                p0,
                p1,
                p2,
                FaceAttributes::with_texture(texture),
                Box::new(TrackingTexCoordSystem),
            )
            .expect("cuboid face points are not collinear")
        })
        .collect()
}

/// A cuboid brush spanning `bounds`.
pub(crate) fn cuboid_brush(world_bounds: &BoundingBox, bounds: &BoundingBox) -> Brush {
    Brush::new(world_bounds, cuboid_faces(bounds)).expect("cuboid brush is valid")
}
