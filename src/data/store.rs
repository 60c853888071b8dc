//! Data Store: per-field sample arrays with indexed bulk access.
//!
//! Fields are slots in an arena indexed by [`DataId`]. All access goes
//! through vertex IDs; the position of a sample in memory is an
//! implementation detail.
//!
//! Bulk operations are not atomic. A block is checked for length first, then
//! written sample by sample; an unknown vertex in the middle of a block
//! leaves the samples before it written. Callers must treat any bulk failure
//! as leaving the field undefined for the current step.

use crate::coupling_error::CouplingError;
use crate::data::field::{Arity, DataField, FieldBuffer};
use crate::debug_invariants::DebugInvariants;
use crate::topology::ids::{DataId, MeshId, VertexId};

/// Owns every data field a participant reads or writes.
#[derive(Clone, Debug)]
pub struct DataStore {
    dimension: usize,
    fields: Vec<DataField>,
}

impl DataStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fields: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Adds a field slot. `id` must be the next dense index.
    pub(crate) fn add_field(
        &mut self,
        id: DataId,
        name: &str,
        mesh: MeshId,
        arity: Arity,
        vertex_count: usize,
    ) {
        debug_assert_eq!(id.index(), self.fields.len());
        log::debug!("field `{name}` ({arity:?}) added on {mesh}");
        self.fields
            .push(DataField::new(id, name, mesh, arity, self.dimension, vertex_count));
    }

    /// Keeps every field on `mesh` at one sample per vertex.
    pub(crate) fn sync_mesh(&mut self, mesh: MeshId, vertex_count: usize) {
        for field in self.fields.iter_mut().filter(|f| f.mesh() == mesh) {
            field.resize(vertex_count);
        }
    }

    pub fn field(&self, data: DataId) -> Result<&DataField, CouplingError> {
        self.fields.get(data.index()).ok_or_else(|| Self::unknown(data))
    }

    fn field_mut(&mut self, data: DataId) -> Result<&mut DataField, CouplingError> {
        self.fields
            .get_mut(data.index())
            .ok_or_else(|| Self::unknown(data))
    }

    fn unknown(data: DataId) -> CouplingError {
        CouplingError::NotFound {
            kind: "data",
            name: data.to_string(),
        }
    }

    // -------------------------------------------------------------------------
    // Single-sample access
    // -------------------------------------------------------------------------

    pub fn write_scalar(&mut self, data: DataId, v: VertexId, value: f64) -> Result<(), CouplingError> {
        let field = self.field_mut(data)?;
        field.expect_components(1)?;
        field.write_sample(v, &[value])
    }

    pub fn write_vector(&mut self, data: DataId, v: VertexId, value: &[f64]) -> Result<(), CouplingError> {
        let dimension = self.dimension;
        let field = self.field_mut(data)?;
        field.expect_components(dimension)?;
        if value.len() != dimension {
            return Err(CouplingError::DimensionMismatch {
                expected: dimension,
                found: value.len(),
            });
        }
        field.write_sample(v, value)
    }

    pub fn read_scalar(&self, data: DataId, v: VertexId) -> Result<f64, CouplingError> {
        let field = self.field(data)?;
        field.expect_components(1)?;
        let mut out = [0.0];
        field.read_sample(v, &mut out)?;
        Ok(out[0])
    }

    pub fn read_vector(&self, data: DataId, v: VertexId) -> Result<Vec<f64>, CouplingError> {
        let field = self.field(data)?;
        field.expect_components(self.dimension)?;
        let mut out = vec![0.0; self.dimension];
        field.read_sample(v, &mut out)?;
        Ok(out)
    }

    // -------------------------------------------------------------------------
    // Bulk access
    // -------------------------------------------------------------------------

    fn write_block(
        &mut self,
        data: DataId,
        components: usize,
        vertices: &[VertexId],
        values: &[f64],
    ) -> Result<(), CouplingError> {
        let field = self.field_mut(data)?;
        field.expect_components(components)?;
        if values.len() != vertices.len() * components {
            return Err(CouplingError::BlockLengthMismatch {
                expected: vertices.len() * components,
                found: values.len(),
            });
        }
        for (&v, sample) in vertices.iter().zip(values.chunks_exact(components)) {
            field.write_sample(v, sample)?;
        }
        Ok(())
    }

    fn read_block(
        &self,
        data: DataId,
        components: usize,
        vertices: &[VertexId],
    ) -> Result<Vec<f64>, CouplingError> {
        let field = self.field(data)?;
        field.expect_components(components)?;
        let mut out = vec![0.0; vertices.len() * components];
        for (&v, sample) in vertices.iter().zip(out.chunks_exact_mut(components)) {
            field.read_sample(v, sample)?;
        }
        Ok(out)
    }

    pub fn write_block_scalar(
        &mut self,
        data: DataId,
        vertices: &[VertexId],
        values: &[f64],
    ) -> Result<(), CouplingError> {
        self.write_block(data, 1, vertices, values)
    }

    /// `values` holds `N × D` components, vertex-major.
    pub fn write_block_vector(
        &mut self,
        data: DataId,
        vertices: &[VertexId],
        values: &[f64],
    ) -> Result<(), CouplingError> {
        self.write_block(data, self.dimension, vertices, values)
    }

    pub fn read_block_scalar(&self, data: DataId, vertices: &[VertexId]) -> Result<Vec<f64>, CouplingError> {
        self.read_block(data, 1, vertices)
    }

    pub fn read_block_vector(&self, data: DataId, vertices: &[VertexId]) -> Result<Vec<f64>, CouplingError> {
        self.read_block(data, self.dimension, vertices)
    }

    // -------------------------------------------------------------------------
    // Exchange buffers
    // -------------------------------------------------------------------------

    /// Snapshot of a whole field for sending.
    pub(crate) fn to_buffer(&self, data: DataId) -> Result<FieldBuffer, CouplingError> {
        let field = self.field(data)?;
        Ok(FieldBuffer {
            mesh: field.mesh(),
            data: field.name().to_owned(),
            values: field.values().to_vec(),
        })
    }

    /// Overwrites a whole field with received samples.
    pub(crate) fn apply_buffer(&mut self, data: DataId, values: &[f64]) -> Result<(), CouplingError> {
        self.field_mut(data)?.replace(values)?;
        self.debug_assert_invariants();
        Ok(())
    }
}

impl DebugInvariants for DataStore {
    fn validate_invariants(&self) -> Result<(), CouplingError> {
        for (index, field) in self.fields.iter().enumerate() {
            if field.id().index() != index {
                return Err(Self::unknown(field.id()));
            }
            let components = field.arity().components(self.dimension);
            field.expect_components(components)?;
            if field.values().len() % components != 0 {
                return Err(CouplingError::BlockLengthMismatch {
                    expected: field.values().len().next_multiple_of(components),
                    found: field.values().len(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (DataStore, DataId, DataId) {
        let mut s = DataStore::new(2);
        let mesh = MeshId::new(0);
        s.add_field(DataId::new(0), "Temperature", mesh, Arity::Scalar, 3);
        s.add_field(DataId::new(1), "Force", mesh, Arity::Vector, 3);
        (s, DataId::new(0), DataId::new(1))
    }

    fn v(i: u32) -> VertexId {
        VertexId::new(i)
    }

    #[test]
    fn scalar_op_on_vector_field_is_arity_mismatch() {
        let (mut s, _, force) = store();
        let err = s.write_scalar(force, v(0), 1.0).unwrap_err();
        assert_eq!(
            err,
            CouplingError::ArityMismatch {
                data: force,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn block_write_is_not_atomic() {
        let (mut s, temp, _) = store();
        let err = s
            .write_block_scalar(temp, &[v(0), v(7), v(1)], &[1.0, 2.0, 3.0])
            .unwrap_err();
        assert!(matches!(err, CouplingError::UnknownVertex { vertex, .. } if vertex == v(7)));
        assert_eq!(s.read_scalar(temp, v(0)).unwrap(), 1.0);
        assert_eq!(s.read_scalar(temp, v(1)).unwrap(), 0.0);
    }

    #[test]
    fn block_length_is_checked_up_front() {
        let (mut s, _, force) = store();
        let err = s.write_block_vector(force, &[v(0), v(1)], &[1.0; 3]).unwrap_err();
        assert_eq!(err, CouplingError::BlockLengthMismatch { expected: 4, found: 3 });
        assert!(s.field(force).unwrap().values().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn sync_grows_fields_with_zeroes() {
        let (mut s, temp, force) = store();
        s.write_scalar(temp, v(2), 5.0).unwrap();
        s.sync_mesh(MeshId::new(0), 5);
        assert_eq!(s.field(force).unwrap().sample_count(), 5);
        assert_eq!(s.read_scalar(temp, v(4)).unwrap(), 0.0);
        assert_eq!(s.read_scalar(temp, v(2)).unwrap(), 5.0);
    }

    #[test]
    fn buffers_carry_mesh_and_name() {
        let (mut s, temp, _) = store();
        s.apply_buffer(temp, &[1.0, 2.0, 3.0]).unwrap();
        let buf = s.to_buffer(temp).unwrap();
        assert_eq!(buf.data, "Temperature");
        assert_eq!(buf.values, vec![1.0, 2.0, 3.0]);
        assert!(s.apply_buffer(temp, &[1.0]).is_err());
    }
}
