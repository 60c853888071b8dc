//! Data module: field samples over mesh vertices.

/// Field records and exchange buffers.
pub mod field;
/// Backing buffers for samples.
pub mod storage;
/// The per-participant Data Store.
pub mod store;

pub use field::{Arity, DataField, FieldBuffer};
pub use storage::{Storage, VecStorage};
pub use store::DataStore;
