//! Strong, zero-cost handles for meshes, mesh entities, and data fields.
//!
//! Every entity the coupling layer hands out is addressed by a dense,
//! non-negative integer assigned in creation order. Wrapping the raw `u32`
//! in a dedicated newtype per entity kind keeps a vertex ID from being
//! passed where an edge ID is expected, at no runtime cost.
//!
//! # Memory layout
//! All handles are `repr(transparent)` over `u32`, so slices of handles can
//! be handed to a transport as plain integers.

use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(
            Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
        )]
        #[repr(transparent)]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Wraps a raw index.
            #[inline]
            pub const fn new(raw: u32) -> Self {
                $name(raw)
            }

            /// Returns the raw integer value.
            #[inline]
            pub const fn get(self) -> u32 {
                self.0
            }

            /// Returns the value as an arena index.
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            pub(crate) fn from_index(index: usize) -> Self {
                // Arenas never approach u32::MAX entries in a coupled run.
                debug_assert!(index <= u32::MAX as usize);
                $name(index as u32)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.0).finish()
            }
        }

        /// Prints the label and the raw integer, e.g. `vertex#3`.
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }

        impl From<$name> for u32 {
            fn from(id: $name) -> u32 {
                id.0
            }
        }
    };
}

entity_id!(
    /// Identifies a mesh within one coupled run.
    MeshId,
    "mesh"
);
entity_id!(
    /// Identifies a vertex within its mesh.
    VertexId,
    "vertex"
);
entity_id!(
    /// Identifies an edge within its mesh.
    EdgeId,
    "edge"
);
entity_id!(
    /// Identifies a triangle or quad within its mesh.
    FaceId,
    "face"
);
entity_id!(
    /// Identifies a (data name, mesh) field.
    DataId,
    "data"
);
