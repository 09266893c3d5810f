//! # `brushwork`
//!
//! A constructive-solid-geometry kernel for convex **brushes**: solids
//! defined by textured face planes and edited by dragging their vertices,
//! edges and faces around — the editing model of classic level editors.
//!
//! ## What is this?
//!
//! A brush is the intersection of half-spaces, one per textured face. This
//! crate keeps two views of it in sync: the face list (planes plus texture
//! attributes) and a half-edge polyhedron built from those planes. Edits go
//! through the polyhedron — move vertices, drag edges and faces, clip,
//! expand, snap to grid, subtract one brush from another — and the face
//! attributes follow the surface through every rebuild, optionally keeping
//! textures visually locked in place.
//!
//! ## Quick Start
//!
//! ```rust
//! use brushwork::{BoundingBox, Brush, BrushFace, DefaultTexCoordSystem, FaceAttributes};
//! use glam::DVec3;
//!
//! let world = BoundingBox::cube(4096.0);
//! let (a, b) = (DVec3::splat(-32.0), DVec3::splat(32.0));
//!
//! // Three defining points per face, counter-clockwise seen from outside.
//! let points = [
//!     [[a.x, a.y, a.z], [a.x, b.y, a.z], [b.x, b.y, a.z]], // bottom
//!     [[a.x, a.y, b.z], [b.x, a.y, b.z], [b.x, b.y, b.z]], // top
//!     [[a.x, a.y, a.z], [b.x, a.y, a.z], [b.x, a.y, b.z]], // front
//!     [[a.x, b.y, a.z], [a.x, b.y, b.z], [b.x, b.y, b.z]], // back
//!     [[a.x, a.y, a.z], [a.x, a.y, b.z], [a.x, b.y, b.z]], // left
//!     [[b.x, a.y, a.z], [b.x, b.y, a.z], [b.x, b.y, b.z]], // right
//! ];
//! let faces = points
//!     .into_iter()
//!     .map(|[p0, p1, p2]| {
//!         BrushFace::new(
//!             DVec3::from(p0),
//!             DVec3::from(p1),
//!             DVec3::from(p2),
//!             FaceAttributes::with_texture("stone"),
//!             Box::new(DefaultTexCoordSystem),
//!         )
//!     })
//!     .collect::<Result<Vec<_>, _>>()?;
//!
//! let mut brush = Brush::new(&world, faces)?;
//! assert_eq!(brush.vertex_count(), 8);
//! assert_eq!(brush.face_count(), 6);
//!
//! // Drag a corner outward; the adjacent quads bend to keep the hull convex.
//! let moved = brush.move_vertices(&world, &[DVec3::splat(32.0)], DVec3::splat(8.0), false)?;
//! assert_eq!(moved, vec![DVec3::splat(40.0)]);
//! assert!(brush.face_count() > 6);
//! # Ok::<(), brushwork::GeometryError>(())
//! ```
//!
//! ## Key Features
//!
//! - **Topology-preserving edits**: vertex, edge and face moves rebuild
//!   the hull and transplant face identity across the rebuild, so texture
//!   attributes survive arbitrary drags
//! - **Plane-faithful construction**: geometry is rebuilt by clipping a
//!   world-sized seed with every face plane in canonical order, detecting
//!   empty, underspecified and redundant face sets
//! - **Booleans**: subtraction into disjoint convex fragments and convex
//!   intersection, with texture provenance on every fragment face
//! - **Texture locking**: an affine solve keeps textures visually pinned
//!   to the surface while the surface moves
//! - **Grid hygiene**: vertex snapping and near-integer correction keep
//!   coordinates editor-friendly after long edit chains
//!
//! ## When NOT to Use
//!
//! - Non-convex solids (model them as sets of convex brushes)
//! - Exact predicates required (the kernel uses f64 with epsilon tolerance)

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod bbox;
mod brush;
mod error;
mod face;
mod matcher;
mod math;
mod plane;
mod polyhedron;
mod spatial_hash;
#[cfg(test)]
mod testutil;

pub use bbox::BoundingBox;
pub use brush::Brush;
pub use error::GeometryError;
pub use face::{
    BrushFace, DefaultModelFactory, DefaultTexCoordSystem, FaceAttributes, ModelFactory,
    TexCoordSystem, TexCoordSystemSnapshot, WrapStyle,
};
pub use matcher::PolyhedronMatcher;
pub use math::{CORRECT_EPSILON, EPSILON, MIN_EDGE_LENGTH, Polygon3, Segment3};
pub use plane::{Plane, PointStatus};
pub use polyhedron::{
    ClipResult, Edge, EdgeIdx, Face, FaceIdx, GeometryCallback, HalfEdge, HalfEdgeIdx,
    NoopCallback, PayloadId, Polyhedron, Vertex, VertexIdx,
};
pub use spatial_hash::{PositionMap, PositionSet};
