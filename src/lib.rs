#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-coupler
//!
//! mesh-coupler is the participant-side core of a multi-physics coupling
//! library. Two solvers each describe their coupling interface as a surface
//! mesh, write field samples on its vertices, and step through shared time
//! windows; the library decides when data moves and what each solver must do
//! at every step.
//!
//! ## Features
//! - Name registry assigning dense IDs to meshes and data fields
//! - Mesh Store with vertices, deduplicated edges, triangles and quads
//! - Data Store with scalar and vector fields, single-sample and block access
//! - Action Ledger for initial data and iteration checkpoints
//! - Serial and parallel, explicit and implicit coupling schemes with
//!   subcycling and convergence measures
//! - A pluggable [`Transport`](coupling::transport::Transport) boundary and an
//!   in-process [`LocalTransport`](coupling::local::LocalTransport)
//!
//! ## Usage
//! ```no_run
//! use mesh_coupler::prelude::*;
//!
//! # fn run(config: CouplingConfig, transport: LocalTransport) -> Result<(), CouplingError> {
//! let mut session = CouplingSession::new("Fluid", config, 0, 1, transport)?;
//! let mesh = session.mesh_id("FluidMesh")?;
//! let vertices = session.create_vertices(mesh, &[0.0, 0.0, 1.0, 0.0])?;
//! let temperature = session.data_id("Temperature", mesh)?;
//! let mut dt = session.initialize()?;
//! while session.is_coupling_ongoing()? {
//!     session.write_block_scalar(temperature, &vertices, &[300.0, 310.0])?;
//!     dt = session.advance(dt)?;
//! }
//! session.finalize()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Invariant checks
//! Stores validate their internal invariants after every mutation in debug
//! builds, or in release builds with the `check-invariants` feature; see
//! [`DebugInvariants`].

pub mod coupling;
pub mod coupling_error;
pub mod data;
pub mod debug_invariants;
pub mod topology;

pub use coupling_error::CouplingError;
pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::coupling::action::{ActionLedger, RequiredAction};
    pub use crate::coupling::config::{
        ConvergencePolicy, CouplingConfig, MappingDirection, MeasureKind, ParticipantConfig,
        Role, SchemeConfig, SchemeKind, SchemeOrder,
    };
    pub use crate::coupling::local::LocalTransport;
    pub use crate::coupling::session::CouplingSession;
    pub use crate::coupling::state::CouplingState;
    pub use crate::coupling::transport::{Transport, TransportError};
    pub use crate::coupling_error::CouplingError;
    pub use crate::data::{Arity, DataStore, FieldBuffer};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::topology::{DataId, EdgeId, FaceId, MeshId, MeshStore, VertexId};
}
