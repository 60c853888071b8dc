//! Boundary to the transport and mapping collaborator.
//!
//! The session never moves bytes or interpolates itself. It calls into a
//! [`Transport`] at fixed points of the protocol, and every call is a
//! blocking rendezvous with the partner. Anything that goes wrong on the
//! other side of this trait is fatal to the coupled run and surfaces as
//! `CouplingAborted`.

use thiserror::Error;

use crate::data::field::FieldBuffer;
use crate::topology::ids::MeshId;

/// Failure inside the transport collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// A mesh this participant provides, as announced during partitioning.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshPartition {
    pub mesh: MeshId,
    pub name: String,
    /// Vertex coordinates, `D` values per vertex, in vertex-ID order.
    pub coords: Vec<f64>,
}

/// Input of the partition call.
#[derive(Clone, Debug)]
pub struct PartitionRequest {
    pub participant: String,
    pub process_index: usize,
    pub process_count: usize,
    pub dimensions: usize,
    /// Meshes this participant provides, with their vertices.
    pub provided: Vec<MeshPartition>,
    /// Meshes this participant receives from the partner.
    pub received: Vec<MeshId>,
}

/// Data of one coupling iteration in flight.
#[derive(Clone, Debug, PartialEq)]
pub struct StepMessage {
    /// Window the data belongs to (1-based).
    pub time_window: u64,
    /// Iteration inside the window (1-based).
    pub iteration: u32,
    pub fields: Vec<FieldBuffer>,
    /// Convergence verdict of the controller; `None` in explicit schemes.
    pub converged: Option<bool>,
}

/// Point at which the collaborator may persist meshes and data.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportPoint {
    pub time_window: u64,
    pub time: f64,
}

/// Calls the coupling session makes into the transport and mapping engine.
///
/// Implementations must block until the partner has taken part in the same
/// call; the protocol's correctness depends on strict step ordering.
pub trait Transport: Send {
    /// Establishes partition and connectivity; returns the vertices of every
    /// mesh in `request.received`.
    fn establish_partition(
        &mut self,
        request: &PartitionRequest,
    ) -> Result<Vec<MeshPartition>, TransportError>;

    /// Sends initial values written on `mesh` and returns the partner's
    /// initial values on it. Both sides call this once per mesh that carries
    /// initialized data, in mesh-ID order.
    fn exchange_initial_data(
        &mut self,
        mesh: MeshId,
        fields: Vec<FieldBuffer>,
    ) -> Result<Vec<FieldBuffer>, TransportError>;

    fn send_step_data(&mut self, message: StepMessage) -> Result<(), TransportError>;

    fn receive_step_data(&mut self) -> Result<StepMessage, TransportError>;

    /// Sends, then waits for the partner's data of the same iteration.
    fn exchange_step_data(&mut self, message: StepMessage) -> Result<StepMessage, TransportError> {
        self.send_step_data(message)?;
        self.receive_step_data()
    }

    /// Computes the interpolation from one mesh to another, or reuses the one
    /// computed before.
    fn compute_mapping(&mut self, from: MeshId, to: MeshId) -> Result<(), TransportError>;

    fn mark_export_point(&mut self, _point: &ExportPoint) -> Result<(), TransportError> {
        Ok(())
    }

    /// Releases all resources; the transport is not used afterwards.
    fn close(&mut self) -> Result<(), TransportError>;
}
