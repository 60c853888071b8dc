//! The coupling state machine.
//!
//! A [`CouplingSession`] is what a solver adapter drives. It owns the
//! registry, the Mesh Store, the Data Store and the Action Ledger for one
//! coupled run, and calls into the [`Transport`] at fixed protocol points.
//!
//! ```text
//! new ──► Initializing ──initialize──► Active ──finalize──► Finalized
//!           (topology)                  │  ▲
//!                                       └──┘ advance / initialize_data
//! ```
//!
//! # Exchange order
//! Data moves only when a step reaches the end of a time window.
//! - `First` sends its data, then receives the partner's (and, in implicit
//!   schemes, the partner's convergence verdict).
//! - `Second`, parallel order: receives, measures convergence, sends.
//! - `Second`, serial order: receives the first round during initialization,
//!   then per window measures, sends, and receives the next round unless the
//!   run has ended.
//!
//! Every transport failure finalizes the session and is reported as
//! `CouplingAborted`.

use itertools::Itertools;

use crate::coupling::action::{ActionLedger, RequiredAction};
use crate::coupling::config::{
    CouplingConfig, MappingDirection, ParticipantPlan, Role, SchemeKind, SchemeOrder,
};
use crate::coupling::convergence::ConvergenceTracker;
use crate::coupling::scheme::WindowClock;
use crate::coupling::state::CouplingState;
use crate::coupling::transport::{
    ExportPoint, MeshPartition, PartitionRequest, StepMessage, Transport, TransportError,
};
use crate::coupling_error::CouplingError;
use crate::data::field::FieldBuffer;
use crate::data::store::DataStore;
use crate::topology::ids::{DataId, EdgeId, FaceId, MeshId, VertexId};
use crate::topology::registry::{IdKind, IdRegistry};
use crate::topology::store::MeshStore;

/// One participant's view of a coupled run.
pub struct CouplingSession<T: Transport> {
    state: CouplingState,
    config: CouplingConfig,
    plan: ParticipantPlan,
    process_index: usize,
    process_count: usize,
    registry: IdRegistry,
    meshes: MeshStore,
    data: DataStore,
    actions: ActionLedger,
    clock: WindowClock,
    /// Present on the convergence controller of an implicit scheme.
    convergence: Option<ConvergenceTracker>,
    transport: T,
    /// Meshes this participant uses, in mesh-ID order.
    used_meshes: Vec<MeshId>,
    write_fields: Vec<DataId>,
    read_fields: Vec<DataId>,
    initial_writes: Vec<DataId>,
    mappings: Vec<(MeshId, MeshId, MappingDirection)>,
    initial_data_done: bool,
    advanced: bool,
    window_complete: bool,
    data_received: bool,
}

/// Registers the field `name` on `mesh` once, however many uses name it.
fn register_field(
    config: &CouplingConfig,
    registry: &mut IdRegistry,
    data: &mut DataStore,
    name: &str,
    mesh: &str,
) -> Result<DataId, CouplingError> {
    let mesh = registry.mesh_id(mesh)?;
    if let Ok(id) = registry.data_id(mesh, name) {
        return Ok(id);
    }
    let arity = config.arity_of(name).ok_or_else(|| CouplingError::NotFound {
        kind: "data",
        name: name.to_owned(),
    })?;
    let id = registry.register_data(mesh, name);
    data.add_field(id, name, mesh, arity, 0);
    Ok(id)
}

impl<T: Transport> CouplingSession<T> {
    /// Builds the session for `participant` and opens the Mesh Store for
    /// topology creation.
    ///
    /// # Errors
    /// `Configuration` if the descriptor is malformed, does not declare
    /// `participant`, or the process layout is impossible.
    pub fn new(
        participant: &str,
        config: CouplingConfig,
        process_index: usize,
        process_count: usize,
        transport: T,
    ) -> Result<Self, CouplingError> {
        if process_count == 0 || process_index >= process_count {
            return Err(CouplingError::Configuration(format!(
                "process index {process_index} is not below process count {process_count}"
            )));
        }
        let plan = config.resolve(participant)?;
        let dimension = config.dimensions;

        let mut registry = IdRegistry::new();
        let mut meshes = MeshStore::new(dimension);
        for name in &config.meshes {
            let id = registry.register_mesh(name);
            meshes.add_mesh(id, name, plan.participant.provides.contains(name));
        }
        let used_meshes = plan
            .participant
            .provides
            .iter()
            .chain(plan.participant.receives.iter().map(|r| &r.mesh))
            .map(|name| registry.mesh_id(name))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .sorted()
            .collect();

        let mut data = DataStore::new(dimension);
        let mut write_fields = Vec::new();
        let mut initial_writes = Vec::new();
        for u in &plan.participant.write_data {
            let id = register_field(&config, &mut registry, &mut data, &u.data, &u.mesh)?;
            write_fields.push(id);
            if plan.sends.iter().any(|x| x.data == u.data && x.initialize) {
                initial_writes.push(id);
            }
        }
        let mut read_fields = Vec::new();
        for u in &plan.participant.read_data {
            read_fields.push(register_field(&config, &mut registry, &mut data, &u.data, &u.mesh)?);
        }

        let mut mappings = Vec::new();
        for m in &plan.participant.mappings {
            mappings.push((registry.mesh_id(&m.from)?, registry.mesh_id(&m.to)?, m.direction));
        }

        let scheme = &config.scheme;
        let convergence = if scheme.kind == SchemeKind::Implicit && plan.role == Role::Second {
            let mut measures = Vec::new();
            for m in &scheme.convergence.measures {
                let id = registry
                    .mesh_id(&m.mesh)
                    .and_then(|mesh| registry.data_id(mesh, &m.data))
                    .map_err(|_| {
                        CouplingError::Configuration(format!(
                            "convergence measure on `{}`/`{}` needs a field of `{participant}`",
                            m.data, m.mesh
                        ))
                    })?;
                measures.push((id, m.kind));
            }
            Some(ConvergenceTracker::new(
                measures,
                scheme.convergence.min_iterations,
                scheme.convergence.max_iterations,
            ))
        } else {
            None
        };

        let clock = WindowClock::new(scheme);
        let mut session = Self {
            state: CouplingState::Constructed,
            config,
            plan,
            process_index,
            process_count,
            registry,
            meshes,
            data,
            actions: ActionLedger::new(),
            clock,
            convergence,
            transport,
            used_meshes,
            write_fields,
            read_fields,
            initial_writes,
            mappings,
            initial_data_done: false,
            advanced: false,
            window_complete: false,
            data_received: false,
        };
        session.state = CouplingState::Initializing;
        log::info!(
            "{}: session opened as {:?} participant (process {}/{})",
            session.plan.name,
            session.plan.role,
            session.process_index,
            session.process_count
        );
        Ok(session)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn state(&self) -> CouplingState {
        self.state
    }

    pub fn participant_name(&self) -> &str {
        &self.plan.name
    }

    pub fn role(&self) -> Role {
        self.plan.role
    }

    pub fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    /// Current simulated time.
    pub fn time(&self) -> f64 {
        self.clock.time()
    }

    /// 1-based index of the time window being computed.
    pub fn time_window(&self) -> u64 {
        self.clock.time_window()
    }

    /// 1-based iteration inside the current window.
    pub fn iteration(&self) -> u32 {
        self.clock.iteration()
    }

    pub fn mesh_store(&self) -> &MeshStore {
        &self.meshes
    }

    pub fn data_store(&self) -> &DataStore {
        &self.data
    }

    pub fn registry(&self) -> &IdRegistry {
        &self.registry
    }

    pub fn action_ledger(&self) -> &ActionLedger {
        &self.actions
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn require_state(
        &self,
        operation: &'static str,
        allowed: &[CouplingState],
    ) -> Result<(), CouplingError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(CouplingError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn require_active(&self, operation: &'static str) -> Result<(), CouplingError> {
        self.require_state(operation, &[CouplingState::Active])
    }

    fn require_open(&self, operation: &'static str) -> Result<(), CouplingError> {
        self.require_state(operation, &[CouplingState::Initializing, CouplingState::Active])
    }

    fn require_topology_phase(&self, operation: &'static str) -> Result<(), CouplingError> {
        self.require_state(operation, &[CouplingState::Initializing])
    }

    // -------------------------------------------------------------------------
    // Names
    // -------------------------------------------------------------------------

    /// ID of a mesh this participant provides or receives.
    pub fn mesh_id(&self, name: &str) -> Result<MeshId, CouplingError> {
        self.require_open("mesh_id")?;
        let id = self.registry.mesh_id(name)?;
        if self.used_meshes.contains(&id) {
            Ok(id)
        } else {
            Err(CouplingError::NotFound {
                kind: "mesh",
                name: name.to_owned(),
            })
        }
    }

    /// ID of the field `data` on `mesh`.
    pub fn data_id(&self, data: &str, mesh: MeshId) -> Result<DataId, CouplingError> {
        self.require_open("data_id")?;
        self.registry.data_id(mesh, data)
    }

    pub fn has_mesh(&self, name: &str) -> bool {
        self.mesh_id(name).is_ok()
    }

    pub fn has_data(&self, data: &str, mesh: MeshId) -> bool {
        self.data_id(data, mesh).is_ok()
    }

    // -------------------------------------------------------------------------
    // Topology
    // -------------------------------------------------------------------------

    fn sync_fields(&mut self, mesh: MeshId) -> Result<(), CouplingError> {
        let count = self.meshes.vertex_count(mesh)?;
        self.data.sync_mesh(mesh, count);
        Ok(())
    }

    pub fn create_vertex(&mut self, mesh: MeshId, position: &[f64]) -> Result<VertexId, CouplingError> {
        self.require_topology_phase("create_vertex")?;
        let id = self.meshes.create_vertex(mesh, position)?;
        self.sync_fields(mesh)?;
        Ok(id)
    }

    /// `positions` holds `N × D` coordinates, vertex-major.
    pub fn create_vertices(
        &mut self,
        mesh: MeshId,
        positions: &[f64],
    ) -> Result<Vec<VertexId>, CouplingError> {
        self.require_topology_phase("create_vertices")?;
        let ids = self.meshes.create_vertices(mesh, positions)?;
        self.sync_fields(mesh)?;
        Ok(ids)
    }

    pub fn vertex_count(&self, mesh: MeshId) -> Result<usize, CouplingError> {
        self.require_open("vertex_count")?;
        self.meshes.vertex_count(mesh)
    }

    /// Nearest vertex for each queried position. Prefer the IDs returned
    /// at creation time; floating-point positions need not be unique.
    pub fn lookup_vertex_ids(
        &self,
        mesh: MeshId,
        positions: &[f64],
    ) -> Result<Vec<VertexId>, CouplingError> {
        self.require_open("lookup_vertex_ids")?;
        self.meshes.lookup_vertex_ids(mesh, positions)
    }

    pub fn vertex_positions(
        &self,
        mesh: MeshId,
        vertices: &[VertexId],
    ) -> Result<Vec<f64>, CouplingError> {
        self.require_open("vertex_positions")?;
        self.meshes.vertex_positions(mesh, vertices)
    }

    /// IDs and coordinates of every vertex; for received meshes this is
    /// what the partner announced during initialization.
    pub fn mesh_vertices(&self, mesh: MeshId) -> Result<(Vec<VertexId>, Vec<f64>), CouplingError> {
        self.require_open("mesh_vertices")?;
        self.meshes.mesh_vertices(mesh)
    }

    pub fn create_edge(&mut self, mesh: MeshId, a: VertexId, b: VertexId) -> Result<EdgeId, CouplingError> {
        self.require_topology_phase("create_edge")?;
        self.meshes.create_edge(mesh, a, b)
    }

    pub fn create_triangle(
        &mut self,
        mesh: MeshId,
        e1: EdgeId,
        e2: EdgeId,
        e3: EdgeId,
    ) -> Result<FaceId, CouplingError> {
        self.require_topology_phase("create_triangle")?;
        self.meshes.create_triangle(mesh, [e1, e2, e3])
    }

    pub fn create_triangle_from_vertices(
        &mut self,
        mesh: MeshId,
        v1: VertexId,
        v2: VertexId,
        v3: VertexId,
    ) -> Result<FaceId, CouplingError> {
        self.require_topology_phase("create_triangle_from_vertices")?;
        self.meshes.create_triangle_from_vertices(mesh, [v1, v2, v3])
    }

    pub fn create_quad(
        &mut self,
        mesh: MeshId,
        e1: EdgeId,
        e2: EdgeId,
        e3: EdgeId,
        e4: EdgeId,
    ) -> Result<FaceId, CouplingError> {
        self.require_topology_phase("create_quad")?;
        self.meshes.create_quad(mesh, [e1, e2, e3, e4])
    }

    pub fn create_quad_from_vertices(
        &mut self,
        mesh: MeshId,
        v1: VertexId,
        v2: VertexId,
        v3: VertexId,
        v4: VertexId,
    ) -> Result<FaceId, CouplingError> {
        self.require_topology_phase("create_quad_from_vertices")?;
        self.meshes.create_quad_from_vertices(mesh, [v1, v2, v3, v4])
    }

    // -------------------------------------------------------------------------
    // Data
    // -------------------------------------------------------------------------

    pub fn write_scalar(&mut self, data: DataId, vertex: VertexId, value: f64) -> Result<(), CouplingError> {
        self.require_open("write_scalar")?;
        self.data.write_scalar(data, vertex, value)
    }

    pub fn write_vector(&mut self, data: DataId, vertex: VertexId, value: &[f64]) -> Result<(), CouplingError> {
        self.require_open("write_vector")?;
        self.data.write_vector(data, vertex, value)
    }

    pub fn write_block_scalar(
        &mut self,
        data: DataId,
        vertices: &[VertexId],
        values: &[f64],
    ) -> Result<(), CouplingError> {
        self.require_open("write_block_scalar")?;
        self.data.write_block_scalar(data, vertices, values)
    }

    pub fn write_block_vector(
        &mut self,
        data: DataId,
        vertices: &[VertexId],
        values: &[f64],
    ) -> Result<(), CouplingError> {
        self.require_open("write_block_vector")?;
        self.data.write_block_vector(data, vertices, values)
    }

    pub fn read_scalar(&self, data: DataId, vertex: VertexId) -> Result<f64, CouplingError> {
        self.require_open("read_scalar")?;
        self.data.read_scalar(data, vertex)
    }

    pub fn read_vector(&self, data: DataId, vertex: VertexId) -> Result<Vec<f64>, CouplingError> {
        self.require_open("read_vector")?;
        self.data.read_vector(data, vertex)
    }

    pub fn read_block_scalar(&self, data: DataId, vertices: &[VertexId]) -> Result<Vec<f64>, CouplingError> {
        self.require_open("read_block_scalar")?;
        self.data.read_block_scalar(data, vertices)
    }

    pub fn read_block_vector(&self, data: DataId, vertices: &[VertexId]) -> Result<Vec<f64>, CouplingError> {
        self.require_open("read_block_vector")?;
        self.data.read_block_vector(data, vertices)
    }

    // -------------------------------------------------------------------------
    // Actions
    // -------------------------------------------------------------------------

    pub fn is_action_pending(&self, action: RequiredAction) -> Result<bool, CouplingError> {
        self.require_open("is_action_pending")?;
        Ok(self.actions.is_pending(action))
    }

    /// # Errors
    /// `NotPending` if the protocol did not request `action`.
    pub fn mark_action_satisfied(&mut self, action: RequiredAction) -> Result<(), CouplingError> {
        self.require_open("mark_action_satisfied")?;
        self.actions.mark_satisfied(action)
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// False once the stop condition is met; finalize promptly afterwards.
    pub fn is_coupling_ongoing(&self) -> Result<bool, CouplingError> {
        self.require_active("is_coupling_ongoing")?;
        Ok(self.clock.is_ongoing())
    }

    /// Whether the last `advance` completed a time window.
    pub fn is_time_window_complete(&self) -> Result<bool, CouplingError> {
        self.require_active("is_time_window_complete")?;
        Ok(self.window_complete)
    }

    /// Whether the last `initialize`, `initialize_data` or `advance`
    /// received new partner data.
    pub fn is_read_data_available(&self) -> Result<bool, CouplingError> {
        self.require_active("is_read_data_available")?;
        Ok(self.data_received)
    }

    /// Whether a step of `step` would reach the window end and send data.
    /// Advisory only.
    pub fn is_write_data_required(&self, step: f64) -> Result<bool, CouplingError> {
        self.require_active("is_write_data_required")?;
        Ok(self.clock.reaches_window_end(step))
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    fn is_implicit(&self) -> bool {
        self.config.scheme.kind == SchemeKind::Implicit
    }

    fn is_serial_second(&self) -> bool {
        self.config.scheme.order == SchemeOrder::Serial && self.plan.role == Role::Second
    }

    /// Releases the transport after a failure inside it and reports the run
    /// as aborted.
    fn abort(&mut self, err: TransportError) -> CouplingError {
        log::error!("{}: coupling aborted: {err}", self.plan.name);
        if let Err(close_err) = self.transport.close() {
            log::error!("{}: closing transport after abort failed: {close_err}", self.plan.name);
        }
        self.state = CouplingState::Finalized;
        CouplingError::CouplingAborted(err.0)
    }

    fn compute_mappings(&mut self, direction: MappingDirection) -> Result<(), CouplingError> {
        let pending: Vec<_> = self
            .mappings
            .iter()
            .filter(|m| m.2 == direction)
            .map(|m| (m.0, m.1))
            .collect();
        for (from, to) in pending {
            log::debug!("{}: mapping {from} -> {to}", self.plan.name);
            self.transport
                .compute_mapping(from, to)
                .map_err(|e| self.abort(e))?;
        }
        Ok(())
    }

    fn buffers(&self, fields: &[DataId]) -> Result<Vec<FieldBuffer>, CouplingError> {
        fields.iter().map(|&id| self.data.to_buffer(id)).collect()
    }

    /// Writes received buffers into the matching read fields.
    fn apply_fields(&mut self, fields: Vec<FieldBuffer>) -> Result<(), CouplingError> {
        for buffer in fields {
            let id = self
                .registry
                .data_id(buffer.mesh, &buffer.data)
                .ok()
                .filter(|id| self.read_fields.contains(id));
            let Some(id) = id else {
                let mesh = self
                    .registry
                    .name_of(IdKind::Mesh, buffer.mesh.get())
                    .unwrap_or("an unknown mesh");
                let err = TransportError::new(format!(
                    "received `{}` on `{mesh}`, which {} does not read",
                    buffer.data, self.plan.name
                ));
                return Err(self.abort(err));
            };
            self.data.apply_buffer(id, &buffer.values)?;
        }
        self.data_received = true;
        Ok(())
    }

    fn outgoing(&self, converged: Option<bool>) -> Result<StepMessage, CouplingError> {
        Ok(StepMessage {
            time_window: self.clock.time_window(),
            iteration: self.clock.iteration(),
            fields: self.buffers(&self.write_fields)?,
            converged,
        })
    }

    /// Checks a partner message is for the current iteration and applies it.
    fn accept(&mut self, message: StepMessage) -> Result<Option<bool>, CouplingError> {
        let expected = (self.clock.time_window(), self.clock.iteration());
        if (message.time_window, message.iteration) != expected {
            let err = TransportError::new(format!(
                "partner is out of step: got window {} iteration {}, expected window {} iteration {}",
                message.time_window, message.iteration, expected.0, expected.1
            ));
            return Err(self.abort(err));
        }
        self.compute_mappings(MappingDirection::Read)?;
        self.apply_fields(message.fields)?;
        Ok(message.converged)
    }

    fn receive_round(&mut self) -> Result<Option<bool>, CouplingError> {
        log::debug!(
            "{}: receiving window {} iteration {}",
            self.plan.name,
            self.clock.time_window(),
            self.clock.iteration()
        );
        let message = self.transport.receive_step_data().map_err(|e| self.abort(e))?;
        self.accept(message)
    }

    fn send_round(&mut self, converged: Option<bool>) -> Result<(), CouplingError> {
        self.compute_mappings(MappingDirection::Write)?;
        let message = self.outgoing(converged)?;
        log::debug!(
            "{}: sending window {} iteration {} ({} fields)",
            self.plan.name,
            message.time_window,
            message.iteration,
            message.fields.len()
        );
        self.transport.send_step_data(message).map_err(|e| self.abort(e))
    }

    fn snapshot_iterate(&mut self) {
        if let Some(tracker) = &mut self.convergence {
            tracker.snapshot(&self.data);
        }
    }

    /// Moves from configuration to time stepping.
    ///
    /// Establishes partitions for every used mesh, loads received meshes,
    /// and, for the second participant of a serial scheme without initial
    /// data, receives the first round of coupling data. Returns the maximum
    /// length of the first step.
    ///
    /// # Errors
    /// `AlreadyInitialized` on a second call, `Configuration` if the
    /// participant's meshes or fields are not wired to the partner,
    /// `CouplingAborted` on transport failure.
    pub fn initialize(&mut self) -> Result<f64, CouplingError> {
        match self.state {
            CouplingState::Initializing => {}
            CouplingState::Active => return Err(CouplingError::AlreadyInitialized),
            state => {
                return Err(CouplingError::InvalidState {
                    operation: "initialize",
                    state,
                });
            }
        }
        self.plan.check_wiring(&self.config)?;
        self.meshes.freeze();

        let mut provided = Vec::new();
        let mut received = Vec::new();
        for &id in &self.used_meshes {
            let mesh = self.meshes.mesh(id)?;
            if mesh.is_provided() {
                provided.push(MeshPartition {
                    mesh: id,
                    name: mesh.name().to_owned(),
                    coords: mesh.coords().to_vec(),
                });
            } else {
                received.push(id);
            }
        }
        let request = PartitionRequest {
            participant: self.plan.name.clone(),
            process_index: self.process_index,
            process_count: self.process_count,
            dimensions: self.config.dimensions,
            provided,
            received,
        };
        log::debug!(
            "{}: establishing partitions ({} provided, {} received)",
            self.plan.name,
            request.provided.len(),
            request.received.len()
        );
        let partitions = self
            .transport
            .establish_partition(&request)
            .map_err(|e| self.abort(e))?;
        for expected in &request.received {
            let Some(partition) = partitions.iter().find(|p| p.mesh == *expected) else {
                let err = TransportError::new(format!("partner did not announce {expected}"));
                return Err(self.abort(err));
            };
            self.meshes.load_partition(partition.mesh, partition.coords.clone())?;
            self.sync_fields(partition.mesh)?;
        }
        for &(from, to, _) in &self.mappings.clone() {
            log::debug!("{}: initial mapping {from} -> {to}", self.plan.name);
            self.transport
                .compute_mapping(from, to)
                .map_err(|e| self.abort(e))?;
        }

        self.state = CouplingState::Active;
        if self.plan.writes_initial_data() {
            self.actions.require(RequiredAction::WriteInitialData);
        }
        if self.is_implicit() {
            self.actions.require(RequiredAction::WriteIterationCheckpoint);
        }
        // the first iterate is compared against the values held before any
        // partner data arrives
        self.snapshot_iterate();
        if self.is_serial_second() && !self.plan.needs_initial_exchange() {
            self.receive_round()?;
        }
        log::info!(
            "{}: initialized, first window of {}",
            self.plan.name,
            self.clock.max_step()
        );
        Ok(self.clock.max_step())
    }

    /// Exchanges initial values. Valid once, after `initialize` and before
    /// the first `advance`; clears `WriteInitialData`.
    ///
    /// Each mesh carrying initialized data is exchanged in mesh-ID order.
    /// Whether the caller actually wrote initial values is not checked.
    pub fn initialize_data(&mut self) -> Result<(), CouplingError> {
        self.require_active("initialize_data")?;
        if self.initial_data_done || self.advanced {
            return Err(CouplingError::InvalidState {
                operation: "initialize_data",
                state: self.state,
            });
        }
        self.initial_data_done = true;

        if self.plan.needs_initial_exchange() {
            let meshes: Vec<MeshId> = self
                .plan
                .sends
                .iter()
                .chain(&self.plan.receives)
                .filter(|x| x.initialize)
                .map(|x| self.registry.mesh_id(&x.mesh))
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .sorted()
                .dedup()
                .collect();
            self.compute_mappings(MappingDirection::Write)?;
            for mesh in meshes {
                let carried: Vec<&str> = self
                    .plan
                    .sends
                    .iter()
                    .filter(|x| x.initialize && self.registry.mesh_id(&x.mesh).ok() == Some(mesh))
                    .map(|x| x.data.as_str())
                    .collect();
                let writes: Vec<DataId> = self
                    .initial_writes
                    .iter()
                    .copied()
                    .filter(|&id| {
                        self.data
                            .field(id)
                            .is_ok_and(|f| carried.contains(&f.name()))
                    })
                    .collect();
                let fields = self.buffers(&writes)?;
                log::debug!(
                    "{}: initial data on {mesh} ({} fields)",
                    self.plan.name,
                    fields.len()
                );
                let received = self
                    .transport
                    .exchange_initial_data(mesh, fields)
                    .map_err(|e| self.abort(e))?;
                if !received.is_empty() {
                    self.compute_mappings(MappingDirection::Read)?;
                    self.apply_fields(received)?;
                }
            }
        } else {
            log::debug!("{}: no initial data configured", self.plan.name);
        }
        self.actions.clear(RequiredAction::WriteInitialData);

        self.snapshot_iterate();
        if self.is_serial_second() && self.plan.needs_initial_exchange() {
            self.receive_round()?;
        }
        Ok(())
    }

    fn check_pending_actions(&self) -> Result<(), CouplingError> {
        for action in self.actions.pending() {
            if self.config.strict_actions {
                return Err(CouplingError::UnfulfilledAction(action));
            }
            log::warn!(
                "{}: advancing while action {action} is still pending",
                self.plan.name
            );
        }
        Ok(())
    }

    /// Closes the current iteration with the controller's verdict.
    fn finish_iteration(&mut self, converged: bool) -> Result<(), CouplingError> {
        if !converged {
            self.clock.repeat_window();
            self.actions.require(RequiredAction::ReadIterationCheckpoint);
            log::debug!(
                "{}: window {} did not converge, iteration {} follows",
                self.plan.name,
                self.clock.time_window(),
                self.clock.iteration()
            );
            return Ok(());
        }

        self.clock.complete_window();
        self.window_complete = true;
        self.actions.clear(RequiredAction::ReadIterationCheckpoint);
        if let Some(tracker) = &mut self.convergence {
            tracker.start_window();
        }
        if self.is_implicit() && self.clock.is_ongoing() {
            self.actions.require(RequiredAction::WriteIterationCheckpoint);
        }
        let completed = self.clock.completed_windows();
        if let Some(every) = self.config.scheme.export_interval {
            if completed % every == 0 {
                let point = ExportPoint {
                    time_window: completed,
                    time: self.clock.time(),
                };
                self.transport
                    .mark_export_point(&point)
                    .map_err(|e| self.abort(e))?;
            }
        }
        log::debug!("{}: window {completed} complete at t = {}", self.plan.name, self.clock.time());
        Ok(())
    }

    /// Accounts for a step of length `step`; at the end of a time window,
    /// exchanges data with the partner and updates the required actions.
    /// Returns the maximum length of the next step.
    ///
    /// # Errors
    /// `InvalidState` outside `Active`, after the run has ended, or before a
    /// required `initialize_data`; `InvalidStepLength` for steps outside
    /// `(0, max]`; `UnfulfilledAction` in strict mode; Data Store errors for
    /// mis-sized received buffers; `CouplingAborted` on transport failure.
    pub fn advance(&mut self, step: f64) -> Result<f64, CouplingError> {
        self.require_active("advance")?;
        if !self.clock.is_ongoing() || (self.plan.needs_initial_exchange() && !self.initial_data_done) {
            return Err(CouplingError::InvalidState {
                operation: "advance",
                state: self.state,
            });
        }
        self.check_pending_actions()?;
        let reached = self.clock.add_step(step)?;
        self.advanced = true;
        self.window_complete = false;
        self.data_received = false;
        if !reached {
            return Ok(self.clock.max_step());
        }

        let implicit = self.is_implicit();
        match (self.plan.role, self.config.scheme.order) {
            (Role::First, _) => {
                self.compute_mappings(MappingDirection::Write)?;
                let message = self.outgoing(None)?;
                let reply = self
                    .transport
                    .exchange_step_data(message)
                    .map_err(|e| self.abort(e))?;
                let verdict = self.accept(reply)?;
                let converged = match (implicit, verdict) {
                    (false, _) => true,
                    (true, Some(v)) => v,
                    (true, None) => {
                        let err = TransportError::new("partner sent no convergence verdict");
                        return Err(self.abort(err));
                    }
                };
                self.finish_iteration(converged)?;
            }
            (Role::Second, SchemeOrder::Parallel) => {
                self.receive_round()?;
                let converged = self.evaluate_convergence();
                self.send_round(implicit.then_some(converged))?;
                self.finish_iteration(converged)?;
            }
            (Role::Second, SchemeOrder::Serial) => {
                let converged = self.evaluate_convergence();
                self.send_round(implicit.then_some(converged))?;
                self.finish_iteration(converged)?;
                if self.clock.is_ongoing() {
                    self.receive_round()?;
                }
            }
        }
        Ok(self.clock.max_step())
    }

    fn evaluate_convergence(&mut self) -> bool {
        let iteration = self.clock.iteration();
        match &mut self.convergence {
            Some(tracker) => tracker.evaluate(iteration, &self.data),
            None => true,
        }
    }

    /// Releases the transport. Repeated calls are no-ops; every other
    /// operation fails with `InvalidState` afterwards.
    pub fn finalize(&mut self) -> Result<(), CouplingError> {
        if self.state == CouplingState::Finalized {
            return Ok(());
        }
        if self.state == CouplingState::Active && self.clock.is_ongoing() {
            log::warn!(
                "{}: finalizing at t = {} while coupling is still ongoing",
                self.plan.name,
                self.clock.time()
            );
        }
        let closed = self.transport.close();
        self.state = CouplingState::Finalized;
        closed.map_err(|e| CouplingError::CouplingAborted(e.0))?;
        log::info!("{}: finalized at t = {}", self.plan.name, self.clock.time());
        Ok(())
    }
}

impl<T: Transport> Drop for CouplingSession<T> {
    fn drop(&mut self) {
        if self.state != CouplingState::Finalized {
            if let Err(err) = self.transport.close() {
                log::error!("{}: closing transport on drop failed: {err}", self.plan.name);
            }
        }
    }
}
