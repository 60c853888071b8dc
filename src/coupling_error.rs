//! CouplingError: Unified error type for mesh-coupler public APIs
//!
//! Every fallible operation of the registry, the mesh and data stores, the
//! action ledger, and the coupling session reports through this type. Caller
//! misuse is never a panic.

use thiserror::Error;

use crate::coupling::action::RequiredAction;
use crate::coupling::state::CouplingState;
use crate::topology::ids::{DataId, MeshId, VertexId};

/// Unified error type for mesh-coupler operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CouplingError {
    /// Malformed or inconsistent coupling topology or scheme.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Operation invoked outside the lifecycle state it is valid in.
    #[error("`{operation}` is not allowed in state {state}")]
    InvalidState {
        operation: &'static str,
        state: CouplingState,
    },
    /// `initialize` was called a second time.
    #[error("Coupling session was already initialized")]
    AlreadyInitialized,
    /// A referenced sub-element does not exist in the mesh.
    #[error("Mesh {mesh}: {kind} {id} does not exist")]
    InvalidReference {
        mesh: MeshId,
        kind: &'static str,
        id: u32,
    },
    /// The vertex is not part of the mesh the field lives on.
    #[error("Data {data}: vertex {vertex} is not part of the owning mesh")]
    UnknownVertex { data: DataId, vertex: VertexId },
    /// Scalar access to a vector field or vice versa.
    #[error("Data {data}: expected {expected} components per sample, operation uses {found}")]
    ArityMismatch {
        data: DataId,
        expected: usize,
        found: usize,
    },
    /// A bulk buffer does not have the length its ID list implies.
    #[error("Block length mismatch: expected {expected} values, found {found}")]
    BlockLengthMismatch { expected: usize, found: usize },
    /// A position does not have D components.
    #[error("Position has {found} components, run dimension is {expected}")]
    DimensionMismatch { expected: usize, found: usize },
    /// Edge or face that does not describe a valid element.
    #[error("Mesh {mesh}: malformed element ({reason})")]
    MalformedElement { mesh: MeshId, reason: String },
    /// Topology may only be created on meshes this participant provides.
    #[error("Mesh `{0}` is received from a partner and cannot be modified")]
    MeshNotProvided(String),
    /// Acknowledging an action the protocol never requested.
    #[error("Action `{0}` is not pending")]
    NotPending(RequiredAction),
    /// A checkpoint action was left pending across an advance (strict mode).
    #[error("Action `{0}` was required but not fulfilled before advance")]
    UnfulfilledAction(RequiredAction),
    /// Name lookup failed.
    #[error("No {kind} named `{name}`")]
    NotFound { kind: &'static str, name: String },
    /// Step length outside `(0, max]`.
    #[error("Step length {step} is not in (0, {max}]")]
    InvalidStepLength { step: f64, max: f64 },
    /// The transport collaborator failed; the coupled run is over.
    #[error("Coupling aborted: {0}")]
    CouplingAborted(String),
}
