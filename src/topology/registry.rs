//! Name → ID registry for meshes and data fields.
//!
//! Registration is append-only: once a name has an ID it keeps it for the
//! lifetime of the run. Each kind owns a separate ID space. Data names are
//! keyed by their owning mesh, so `"Temperature"` on two meshes yields two
//! distinct [`DataId`]s.

use hashbrown::HashMap;
use std::hash::Hash;

use crate::coupling_error::CouplingError;
use crate::topology::ids::{DataId, MeshId};

/// Which ID space a name lives in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IdKind {
    /// Mesh names.
    Mesh,
    /// Data names on the given mesh.
    Data(MeshId),
}

impl IdKind {
    fn label(self) -> &'static str {
        match self {
            IdKind::Mesh => "mesh",
            IdKind::Data(_) => "data",
        }
    }
}

/// Bidirectional, append-only table: key → dense index and index → key.
#[derive(Clone, Debug)]
pub struct NameTable<K> {
    forward: HashMap<K, u32>,
    reverse: Vec<K>,
}

impl<K> Default for NameTable<K> {
    fn default() -> Self {
        Self {
            forward: HashMap::new(),
            reverse: Vec::new(),
        }
    }
}

impl<K: Clone + Eq + Hash> NameTable<K> {
    /// Returns the index of `key`, appending it if unseen.
    pub fn intern(&mut self, key: K) -> u32 {
        if let Some(&id) = self.forward.get(&key) {
            return id;
        }
        let id = self.reverse.len() as u32;
        self.reverse.push(key.clone());
        self.forward.insert(key, id);
        id
    }

    pub fn get(&self, key: &K) -> Option<u32> {
        self.forward.get(key).copied()
    }

    pub fn key(&self, id: u32) -> Option<&K> {
        self.reverse.get(id as usize)
    }

    pub fn len(&self) -> usize {
        self.reverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }
}

/// Stable integer identifiers for meshes and data fields, resolved by name.
#[derive(Clone, Debug, Default)]
pub struct IdRegistry {
    meshes: NameTable<String>,
    data: NameTable<(MeshId, String)>,
}

impl IdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name` in the ID space of `kind` and returns its raw ID.
    ///
    /// Idempotent: a second call with the same `(kind, name)` returns the
    /// ID handed out by the first.
    pub fn register(&mut self, kind: IdKind, name: &str) -> u32 {
        match kind {
            IdKind::Mesh => self.meshes.intern(name.to_owned()),
            IdKind::Data(mesh) => self.data.intern((mesh, name.to_owned())),
        }
    }

    /// Resolves a previously registered name.
    ///
    /// # Errors
    /// `NotFound` if `(kind, name)` was never registered.
    pub fn resolve(&self, kind: IdKind, name: &str) -> Result<u32, CouplingError> {
        let found = match kind {
            IdKind::Mesh => self.meshes.get(&name.to_owned()),
            IdKind::Data(mesh) => self.data.get(&(mesh, name.to_owned())),
        };
        found.ok_or_else(|| CouplingError::NotFound {
            kind: kind.label(),
            name: name.to_owned(),
        })
    }

    /// Whether `(kind, name)` has been registered. Never fails.
    pub fn exists(&self, kind: IdKind, name: &str) -> bool {
        self.resolve(kind, name).is_ok()
    }

    pub fn register_mesh(&mut self, name: &str) -> MeshId {
        MeshId::new(self.register(IdKind::Mesh, name))
    }

    pub fn register_data(&mut self, mesh: MeshId, name: &str) -> DataId {
        DataId::new(self.register(IdKind::Data(mesh), name))
    }

    pub fn mesh_id(&self, name: &str) -> Result<MeshId, CouplingError> {
        self.resolve(IdKind::Mesh, name).map(MeshId::new)
    }

    pub fn data_id(&self, mesh: MeshId, name: &str) -> Result<DataId, CouplingError> {
        self.resolve(IdKind::Data(mesh), name).map(DataId::new)
    }

    /// Reverse lookup: the name raw ID `id` was registered under in the ID
    /// space of `kind`.
    pub fn name_of(&self, kind: IdKind, id: u32) -> Option<&str> {
        match kind {
            IdKind::Mesh => self.meshes.key(id).map(String::as_str),
            IdKind::Data(mesh) => self
                .data
                .key(id)
                .filter(|(owner, _)| *owner == mesh)
                .map(|(_, name)| name.as_str()),
        }
    }

    /// Owning mesh and name a data field was registered under.
    pub fn data_key(&self, id: DataId) -> Option<(MeshId, &str)> {
        self.data.key(id.get()).map(|(mesh, name)| (*mesh, name.as_str()))
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }
}
