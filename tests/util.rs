#![allow(dead_code)]
use std::collections::VecDeque;

use mesh_coupler::coupling::transport::{
    ExportPoint, MeshPartition, PartitionRequest, StepMessage, Transport, TransportError,
};
use mesh_coupler::prelude::*;

/// Explicit two-participant run: `A` provides `MeshA` and writes
/// `Temperature`, `B` receives `MeshA` and reads it.
pub fn temperature_config(order: SchemeOrder, kind: SchemeKind, windows: u64) -> CouplingConfig {
    let scheme = SchemeConfig::new(order, kind, "A", "B", 0.1)
        .with_max_time_windows(windows)
        .with_exchange("Temperature", "MeshA", "A", "B", false);
    CouplingConfig::new(2, scheme)
        .with_mesh("MeshA")
        .with_data("Temperature", Arity::Scalar)
        .with_participant(ParticipantConfig::new("A").provides("MeshA").writes("Temperature", "MeshA"))
        .with_participant(
            ParticipantConfig::new("B")
                .receives("MeshA", "A")
                .reads("Temperature", "MeshA"),
        )
}

/// Fluid–structure style run in both directions: `Fluid` writes `Force`,
/// `Solid` writes `Displacement`, both on `FluidMesh`.
pub fn two_way_config(order: SchemeOrder, kind: SchemeKind, windows: u64) -> CouplingConfig {
    let scheme = SchemeConfig::new(order, kind, "Fluid", "Solid", 0.1)
        .with_max_time_windows(windows)
        .with_exchange("Force", "FluidMesh", "Fluid", "Solid", false)
        .with_exchange("Displacement", "FluidMesh", "Solid", "Fluid", false);
    CouplingConfig::new(2, scheme)
        .with_mesh("FluidMesh")
        .with_data("Force", Arity::Vector)
        .with_data("Displacement", Arity::Scalar)
        .with_participant(
            ParticipantConfig::new("Fluid")
                .provides("FluidMesh")
                .writes("Force", "FluidMesh")
                .reads("Displacement", "FluidMesh"),
        )
        .with_participant(
            ParticipantConfig::new("Solid")
                .receives("FluidMesh", "Fluid")
                .reads("Force", "FluidMesh")
                .writes("Displacement", "FluidMesh"),
        )
}

pub fn step(time_window: u64, iteration: u32, fields: Vec<FieldBuffer>, converged: Option<bool>) -> StepMessage {
    StepMessage {
        time_window,
        iteration,
        fields,
        converged,
    }
}

pub fn buffer(mesh: u32, data: &str, values: &[f64]) -> FieldBuffer {
    FieldBuffer {
        mesh: MeshId::new(mesh),
        data: data.to_owned(),
        values: values.to_vec(),
    }
}

/// Transport replaying a scripted partner and recording every call.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    pub partitions: Vec<MeshPartition>,
    pub initial_replies: VecDeque<Vec<FieldBuffer>>,
    pub replies: VecDeque<StepMessage>,
    pub requests: Vec<PartitionRequest>,
    pub sent_initial: Vec<(MeshId, Vec<FieldBuffer>)>,
    pub sent: Vec<StepMessage>,
    pub mappings: Vec<(MeshId, MeshId)>,
    pub exports: Vec<ExportPoint>,
    pub closed: usize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_partition(mut self, mesh: u32, name: &str, coords: &[f64]) -> Self {
        self.partitions.push(MeshPartition {
            mesh: MeshId::new(mesh),
            name: name.to_owned(),
            coords: coords.to_vec(),
        });
        self
    }

    pub fn with_reply(mut self, message: StepMessage) -> Self {
        self.replies.push_back(message);
        self
    }

    pub fn with_initial_reply(mut self, fields: Vec<FieldBuffer>) -> Self {
        self.initial_replies.push_back(fields);
        self
    }
}

impl Transport for ScriptedTransport {
    fn establish_partition(
        &mut self,
        request: &PartitionRequest,
    ) -> Result<Vec<MeshPartition>, TransportError> {
        self.requests.push(request.clone());
        Ok(self.partitions.clone())
    }

    fn exchange_initial_data(
        &mut self,
        mesh: MeshId,
        fields: Vec<FieldBuffer>,
    ) -> Result<Vec<FieldBuffer>, TransportError> {
        self.sent_initial.push((mesh, fields));
        Ok(self.initial_replies.pop_front().unwrap_or_default())
    }

    fn send_step_data(&mut self, message: StepMessage) -> Result<(), TransportError> {
        self.sent.push(message);
        Ok(())
    }

    fn receive_step_data(&mut self) -> Result<StepMessage, TransportError> {
        self.replies
            .pop_front()
            .ok_or_else(|| TransportError::new("script exhausted"))
    }

    fn compute_mapping(&mut self, from: MeshId, to: MeshId) -> Result<(), TransportError> {
        self.mappings.push((from, to));
        Ok(())
    }

    fn mark_export_point(&mut self, point: &ExportPoint) -> Result<(), TransportError> {
        self.exports.push(point.clone());
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.closed += 1;
        Ok(())
    }
}

/// Session of participant `A` with the two-vertex mesh (0,0), (1,0).
pub fn session_a(
    config: CouplingConfig,
    transport: ScriptedTransport,
) -> (CouplingSession<ScriptedTransport>, MeshId, DataId, Vec<VertexId>) {
    let mut s = CouplingSession::new("A", config, 0, 1, transport).unwrap();
    let mesh = s.mesh_id("MeshA").unwrap();
    let vertices = s.create_vertices(mesh, &[0.0, 0.0, 1.0, 0.0]).unwrap();
    let data = s.data_id("Temperature", mesh).unwrap();
    (s, mesh, data, vertices)
}
