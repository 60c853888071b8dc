//! Mesh Store: arena of meshes addressed by [`MeshId`].
//!
//! The store is open for topology creation until the coupling session
//! freezes it at `initialize`; from then on every creation call fails with
//! `InvalidState`. Received meshes are never edited by the caller; their
//! vertices arrive through [`MeshStore::load_partition`].

use crate::coupling::state::CouplingState;
use crate::coupling_error::CouplingError;
use crate::debug_invariants::DebugInvariants;
use crate::topology::ids::{EdgeId, FaceId, MeshId, VertexId};
use crate::topology::mesh::Mesh;

/// Owns the topology of every mesh a participant uses.
#[derive(Clone, Debug)]
pub struct MeshStore {
    dimension: usize,
    meshes: Vec<Mesh>,
    frozen: bool,
}

impl MeshStore {
    /// Empty store for a run of the given spatial dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            meshes: Vec::new(),
            frozen: false,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Adds a mesh slot. `id` must be the next dense index.
    pub(crate) fn add_mesh(&mut self, id: MeshId, name: &str, provided: bool) {
        debug_assert_eq!(id.index(), self.meshes.len());
        self.meshes
            .push(Mesh::new(id, name, self.dimension, provided));
    }

    /// Ends the configuration phase; topology is read-only afterwards.
    pub(crate) fn freeze(&mut self) {
        log::debug!("mesh store frozen with {} meshes", self.meshes.len());
        self.frozen = true;
    }

    pub fn mesh(&self, id: MeshId) -> Result<&Mesh, CouplingError> {
        self.meshes
            .get(id.index())
            .ok_or(CouplingError::InvalidReference {
                mesh: id,
                kind: "mesh",
                id: id.get(),
            })
    }

    /// Mesh open for topology creation by this participant.
    fn editable(&mut self, id: MeshId, operation: &'static str) -> Result<&mut Mesh, CouplingError> {
        if self.frozen {
            return Err(CouplingError::InvalidState {
                operation,
                state: CouplingState::Active,
            });
        }
        let mesh = self
            .meshes
            .get_mut(id.index())
            .ok_or(CouplingError::InvalidReference {
                mesh: id,
                kind: "mesh",
                id: id.get(),
            })?;
        if !mesh.is_provided() {
            return Err(CouplingError::MeshNotProvided(mesh.name().to_owned()));
        }
        Ok(mesh)
    }

    /// Runs one creation call on an editable mesh, then checks the elements
    /// it added.
    fn edit<R>(
        &mut self,
        id: MeshId,
        operation: &'static str,
        create: impl FnOnce(&mut Mesh) -> Result<R, CouplingError>,
    ) -> Result<R, CouplingError> {
        let mesh = self.editable(id, operation)?;
        let mark = mesh.watermark();
        let out = create(&mut *mesh)?;
        crate::debug_invariants!(mesh.validate_since(mark), "mesh invariant violated");
        Ok(out)
    }

    pub fn create_vertex(&mut self, mesh: MeshId, position: &[f64]) -> Result<VertexId, CouplingError> {
        self.edit(mesh, "create_vertex", |m| m.push_vertex(position))
    }

    /// Bulk form of [`create_vertex`](Self::create_vertex); `positions` holds
    /// `N × D` coordinates, vertex-major.
    ///
    /// The whole block is validated before any vertex is added.
    pub fn create_vertices(
        &mut self,
        mesh: MeshId,
        positions: &[f64],
    ) -> Result<Vec<VertexId>, CouplingError> {
        let dimension = self.dimension;
        if positions.len() % dimension != 0 {
            return Err(CouplingError::BlockLengthMismatch {
                expected: positions.len().next_multiple_of(dimension),
                found: positions.len(),
            });
        }
        self.edit(mesh, "create_vertices", |m| {
            positions
                .chunks_exact(dimension)
                .map(|p| m.push_vertex(p))
                .collect()
        })
    }

    pub fn vertex_count(&self, mesh: MeshId) -> Result<usize, CouplingError> {
        Ok(self.mesh(mesh)?.vertex_count())
    }

    /// Nearest existing vertex for each of the `N × D` query coordinates.
    ///
    /// Position lookup is not unique under floating point; prefer the IDs
    /// returned at creation time.
    pub fn lookup_vertex_ids(
        &self,
        mesh: MeshId,
        positions: &[f64],
    ) -> Result<Vec<VertexId>, CouplingError> {
        let mesh = self.mesh(mesh)?;
        if positions.len() % self.dimension != 0 {
            return Err(CouplingError::BlockLengthMismatch {
                expected: positions.len().next_multiple_of(self.dimension),
                found: positions.len(),
            });
        }
        positions
            .chunks_exact(self.dimension)
            .map(|p| mesh.nearest_vertex(p))
            .collect()
    }

    /// Coordinates of the given vertices, `D` values each.
    pub fn vertex_positions(
        &self,
        mesh: MeshId,
        vertices: &[VertexId],
    ) -> Result<Vec<f64>, CouplingError> {
        let mesh = self.mesh(mesh)?;
        let mut out = Vec::with_capacity(vertices.len() * self.dimension);
        for &v in vertices {
            out.extend_from_slice(mesh.position(v)?);
        }
        Ok(out)
    }

    /// All vertex IDs of a mesh together with their coordinates.
    pub fn mesh_vertices(&self, mesh: MeshId) -> Result<(Vec<VertexId>, Vec<f64>), CouplingError> {
        let mesh = self.mesh(mesh)?;
        let ids = (0..mesh.vertex_count()).map(VertexId::from_index).collect();
        Ok((ids, mesh.coords().to_vec()))
    }

    pub fn create_edge(
        &mut self,
        mesh: MeshId,
        a: VertexId,
        b: VertexId,
    ) -> Result<EdgeId, CouplingError> {
        self.edit(mesh, "create_edge", |m| m.push_edge(a, b))
    }

    pub fn create_triangle(
        &mut self,
        mesh: MeshId,
        edges: [EdgeId; 3],
    ) -> Result<FaceId, CouplingError> {
        self.edit(mesh, "create_triangle", |m| m.push_triangle(edges))
    }

    /// Creates a triangle, reusing the edge of any vertex pair that is
    /// already connected.
    pub fn create_triangle_from_vertices(
        &mut self,
        mesh: MeshId,
        vertices: [VertexId; 3],
    ) -> Result<FaceId, CouplingError> {
        self.edit(mesh, "create_triangle_from_vertices", |m| m.push_triangle_from_vertices(vertices))
    }

    pub fn create_quad(&mut self, mesh: MeshId, edges: [EdgeId; 4]) -> Result<FaceId, CouplingError> {
        self.edit(mesh, "create_quad", |m| m.push_quad(edges))
    }

    pub fn create_quad_from_vertices(
        &mut self,
        mesh: MeshId,
        vertices: [VertexId; 4],
    ) -> Result<FaceId, CouplingError> {
        self.edit(mesh, "create_quad_from_vertices", |m| m.push_quad_from_vertices(vertices))
    }

    /// Installs the vertices of a received mesh, replacing whatever the
    /// slot held.
    pub(crate) fn load_partition(&mut self, mesh: MeshId, coords: Vec<f64>) -> Result<(), CouplingError> {
        let slot = self
            .meshes
            .get_mut(mesh.index())
            .ok_or(CouplingError::InvalidReference {
                mesh,
                kind: "mesh",
                id: mesh.get(),
            })?;
        if slot.is_provided() {
            return Err(CouplingError::Configuration(format!(
                "partition data arrived for mesh `{}`, which this participant provides",
                slot.name()
            )));
        }
        slot.replace_vertices(coords)?;
        log::debug!("mesh `{}` loaded with {} vertices", slot.name(), slot.vertex_count());
        self.debug_assert_invariants();
        Ok(())
    }
}

impl DebugInvariants for MeshStore {
    fn validate_invariants(&self) -> Result<(), CouplingError> {
        for (index, mesh) in self.meshes.iter().enumerate() {
            if mesh.id().index() != index || mesh.dimension() != self.dimension {
                return Err(CouplingError::InvalidReference {
                    mesh: mesh.id(),
                    kind: "mesh",
                    id: index as u32,
                });
            }
            mesh.validate()?;
        }
        Ok(())
    }
}
