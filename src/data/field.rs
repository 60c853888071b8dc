//! A data field: one sample per vertex of its owning mesh.

use serde::{Deserialize, Serialize};

use crate::coupling_error::CouplingError;
use crate::data::storage::{Storage, VecStorage};
use crate::topology::ids::{DataId, MeshId, VertexId};

/// Shape of one sample.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Arity {
    /// One value per vertex.
    Scalar,
    /// `D` values per vertex, D being the run's dimension.
    Vector,
}

impl Arity {
    /// Number of values per sample in a run of the given dimension.
    pub fn components(self, dimension: usize) -> usize {
        match self {
            Arity::Scalar => 1,
            Arity::Vector => dimension,
        }
    }
}

/// Samples of one `(data name, mesh)` pair, addressed by vertex ID.
#[derive(Clone, Debug)]
pub struct DataField<S = VecStorage<f64>> {
    id: DataId,
    name: String,
    mesh: MeshId,
    arity: Arity,
    components: usize,
    values: S,
}

impl<S: Storage<f64>> DataField<S> {
    pub(crate) fn new(
        id: DataId,
        name: &str,
        mesh: MeshId,
        arity: Arity,
        dimension: usize,
        vertex_count: usize,
    ) -> Self {
        let components = arity.components(dimension);
        Self {
            id,
            name: name.to_owned(),
            mesh,
            arity,
            components,
            values: S::with_len(vertex_count * components, 0.0),
        }
    }

    pub fn id(&self) -> DataId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mesh(&self) -> MeshId {
        self.mesh
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// Values per sample (1 for scalars, D for vectors).
    pub fn components(&self) -> usize {
        self.components
    }

    pub fn sample_count(&self) -> usize {
        self.values.len() / self.components
    }

    /// All samples, vertex-major.
    pub fn values(&self) -> &[f64] {
        self.values.as_slice()
    }

    /// Extends the field with zero samples up to `vertex_count`, or trims it
    /// when a received mesh was replaced by a smaller one.
    pub(crate) fn resize(&mut self, vertex_count: usize) {
        self.values.resize(vertex_count * self.components, 0.0);
    }

    /// Overwrites every sample at once.
    pub(crate) fn replace(&mut self, values: &[f64]) -> Result<(), CouplingError> {
        if values.len() != self.values.len() {
            return Err(CouplingError::BlockLengthMismatch {
                expected: self.values.len(),
                found: values.len(),
            });
        }
        self.values.write_at(0, values)
    }

    /// Fails unless each sample of this field has `found` components.
    pub(crate) fn expect_components(&self, found: usize) -> Result<(), CouplingError> {
        if found == self.components {
            Ok(())
        } else {
            Err(CouplingError::ArityMismatch {
                data: self.id,
                expected: self.components,
                found,
            })
        }
    }

    fn offset(&self, v: VertexId) -> Result<usize, CouplingError> {
        if v.index() < self.sample_count() {
            Ok(v.index() * self.components)
        } else {
            Err(CouplingError::UnknownVertex {
                data: self.id,
                vertex: v,
            })
        }
    }

    pub(crate) fn write_sample(&mut self, v: VertexId, sample: &[f64]) -> Result<(), CouplingError> {
        let offset = self.offset(v)?;
        self.values.write_at(offset, sample)
    }

    pub(crate) fn read_sample(&self, v: VertexId, out: &mut [f64]) -> Result<(), CouplingError> {
        let offset = self.offset(v)?;
        self.values.read_into(offset, out)
    }
}

/// Samples of one field in flight between participants, vertex-major in
/// vertex-ID order. Fields are matched by `(mesh, data name)` because data
/// IDs are local to a participant while mesh IDs are shared by the run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldBuffer {
    pub mesh: MeshId,
    pub data: String,
    pub values: Vec<f64>,
}
