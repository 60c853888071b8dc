//! Mesh topology: identifiers, the name registry, and the Mesh Store.
//!
//! Meshes, vertices, edges, faces and data fields are all addressed by dense
//! integer IDs. The registry maps names to IDs; the store owns the elements.

pub(crate) mod geometry;
pub mod ids;
pub mod mesh;
pub mod registry;
pub mod store;

pub use ids::{DataId, EdgeId, FaceId, MeshId, VertexId};
pub use mesh::{Face, Mesh};
pub use registry::{IdKind, IdRegistry, NameTable};
pub use store::MeshStore;
