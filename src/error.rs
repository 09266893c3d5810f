//! Error taxonomy for brush construction and editing.

use thiserror::Error;

/// Why a set of faces failed to produce a valid brush.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum GeometryError {
    /// The face planes enclose no volume at all.
    #[error("brush has no volume")]
    Empty,

    /// The geometry degenerated (non-planar input, healing failed, or a
    /// face lost its boundary).
    #[error("brush geometry is invalid")]
    Invalid,

    /// The planes enclose a volume, but some part of its surface is not
    /// covered by any declared face.
    #[error("brush is not fully specified by its faces")]
    NotFullySpecified,
}
