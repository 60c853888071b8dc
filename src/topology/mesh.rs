//! Per-mesh topology: vertices, edges, triangles and quads.
//!
//! A `Mesh` is an arena. Vertex, edge and face IDs are indices into it,
//! handed out by monotonic counters, so no element ever refers to another
//! through a pointer. Edges remember the unordered vertex pair they connect
//! which lets the vertex-based face constructors reuse existing edges.

use hashbrown::HashMap;
use itertools::Itertools;

use crate::coupling_error::CouplingError;
use crate::topology::geometry;
use crate::topology::ids::{EdgeId, FaceId, MeshId, VertexId};

/// Two-dimensional element bounded by edges.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Face {
    Triangle([EdgeId; 3]),
    Quad([EdgeId; 4]),
}

impl Face {
    pub fn edges(&self) -> &[EdgeId] {
        match self {
            Face::Triangle(e) => e.as_slice(),
            Face::Quad(e) => e.as_slice(),
        }
    }
}

/// Topology of one mesh.
#[derive(Clone, Debug)]
pub struct Mesh {
    id: MeshId,
    name: String,
    dimension: usize,
    /// Whether this participant creates the topology (as opposed to
    /// receiving it from a partner during partitioning).
    provided: bool,
    /// Vertex coordinates, `dimension` values per vertex, in ID order.
    coords: Vec<f64>,
    edges: Vec<[VertexId; 2]>,
    /// First edge created for each unordered vertex pair.
    edge_lookup: HashMap<(VertexId, VertexId), EdgeId>,
    faces: Vec<Face>,
    triangle_count: usize,
}

/// Edge and face counts at one point in a mesh's history.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Watermark {
    edges: usize,
    faces: usize,
}

fn unordered(a: VertexId, b: VertexId) -> (VertexId, VertexId) {
    if a <= b { (a, b) } else { (b, a) }
}

impl Mesh {
    pub(crate) fn new(id: MeshId, name: &str, dimension: usize, provided: bool) -> Self {
        Self {
            id,
            name: name.to_owned(),
            dimension,
            provided,
            coords: Vec::new(),
            edges: Vec::new(),
            edge_lookup: HashMap::new(),
            faces: Vec::new(),
            triangle_count: 0,
        }
    }

    pub fn id(&self) -> MeshId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn is_provided(&self) -> bool {
        self.provided
    }

    pub fn vertex_count(&self) -> usize {
        self.coords.len() / self.dimension
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangle_count
    }

    pub fn quad_count(&self) -> usize {
        self.faces.len() - self.triangle_count
    }

    pub fn contains_vertex(&self, v: VertexId) -> bool {
        v.index() < self.vertex_count()
    }

    /// Coordinates of all vertices, `dimension` values each, in ID order.
    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    pub fn position(&self, v: VertexId) -> Result<&[f64], CouplingError> {
        self.check_vertex(v)?;
        let start = v.index() * self.dimension;
        Ok(&self.coords[start..start + self.dimension])
    }

    pub fn edge(&self, e: EdgeId) -> Result<[VertexId; 2], CouplingError> {
        self.edges
            .get(e.index())
            .copied()
            .ok_or_else(|| self.missing("edge", e.get()))
    }

    pub fn face(&self, f: FaceId) -> Result<Face, CouplingError> {
        self.faces
            .get(f.index())
            .copied()
            .ok_or_else(|| self.missing("face", f.get()))
    }

    /// Edge already connecting `a` and `b`, in either direction.
    pub fn find_edge(&self, a: VertexId, b: VertexId) -> Option<EdgeId> {
        self.edge_lookup.get(&unordered(a, b)).copied()
    }

    /// Per-axis `(min, max)` over all vertices; `None` for an empty mesh.
    pub fn bounding_box(&self) -> Option<Vec<(f64, f64)>> {
        if self.coords.is_empty() {
            return None;
        }
        let mut bounds = vec![(f64::INFINITY, f64::NEG_INFINITY); self.dimension];
        for p in self.coords.chunks_exact(self.dimension) {
            for (b, &x) in bounds.iter_mut().zip(p) {
                b.0 = b.0.min(x);
                b.1 = b.1.max(x);
            }
        }
        Some(bounds)
    }

    /// Vertex nearest to `position`.
    pub fn nearest_vertex(&self, position: &[f64]) -> Result<VertexId, CouplingError> {
        self.check_position(position)?;
        self.coords
            .chunks_exact(self.dimension)
            .map(|p| geometry::distance_squared(p, position))
            .position_min_by(|a, b| a.total_cmp(b))
            .map(VertexId::from_index)
            .ok_or_else(|| CouplingError::NotFound {
                kind: "vertex",
                name: format!("{position:?} in {}", self.name),
            })
    }

    // -------------------------------------------------------------------------
    // Creation
    // -------------------------------------------------------------------------

    pub(crate) fn push_vertex(&mut self, position: &[f64]) -> Result<VertexId, CouplingError> {
        self.check_position(position)?;
        let id = VertexId::from_index(self.vertex_count());
        self.coords.extend_from_slice(position);
        Ok(id)
    }

    /// Replaces all vertices; used when a received mesh arrives from the
    /// partition exchange.
    pub(crate) fn replace_vertices(&mut self, coords: Vec<f64>) -> Result<(), CouplingError> {
        if coords.len() % self.dimension != 0 {
            return Err(CouplingError::BlockLengthMismatch {
                expected: coords.len().next_multiple_of(self.dimension),
                found: coords.len(),
            });
        }
        self.coords = coords;
        self.edges.clear();
        self.edge_lookup.clear();
        self.faces.clear();
        self.triangle_count = 0;
        Ok(())
    }

    pub(crate) fn push_edge(&mut self, a: VertexId, b: VertexId) -> Result<EdgeId, CouplingError> {
        self.check_vertex(a)?;
        self.check_vertex(b)?;
        if a == b {
            return Err(CouplingError::MalformedElement {
                mesh: self.id,
                reason: format!("edge connects {a} to itself"),
            });
        }
        let id = EdgeId::from_index(self.edges.len());
        self.edges.push([a, b]);
        self.edge_lookup.entry(unordered(a, b)).or_insert(id);
        Ok(id)
    }

    pub(crate) fn find_or_push_edge(
        &mut self,
        a: VertexId,
        b: VertexId,
    ) -> Result<EdgeId, CouplingError> {
        match self.find_edge(a, b) {
            Some(e) => Ok(e),
            None => self.push_edge(a, b),
        }
    }

    pub(crate) fn push_triangle(&mut self, edges: [EdgeId; 3]) -> Result<FaceId, CouplingError> {
        self.check_closed(&edges)?;
        self.triangle_count += 1;
        Ok(self.push_face(Face::Triangle(edges)))
    }

    pub(crate) fn push_quad(&mut self, edges: [EdgeId; 4]) -> Result<FaceId, CouplingError> {
        self.check_closed(&edges)?;
        Ok(self.push_face(Face::Quad(edges)))
    }

    pub(crate) fn push_triangle_from_vertices(
        &mut self,
        vertices: [VertexId; 3],
    ) -> Result<FaceId, CouplingError> {
        self.check_distinct(&vertices)?;
        let [a, b, c] = vertices;
        let edges = [
            self.find_or_push_edge(a, b)?,
            self.find_or_push_edge(b, c)?,
            self.find_or_push_edge(c, a)?,
        ];
        self.push_triangle(edges)
    }

    /// Orders the corners into a ring before connecting them, so callers may
    /// pass the four vertices in any order.
    pub(crate) fn push_quad_from_vertices(
        &mut self,
        vertices: [VertexId; 4],
    ) -> Result<FaceId, CouplingError> {
        self.check_distinct(&vertices)?;
        let mut corners = [[0.0; 3]; 4];
        for (corner, &v) in corners.iter_mut().zip(&vertices) {
            *corner = geometry::lift(self.position(v)?);
        }
        let order = geometry::ring_order(&corners).ok_or_else(|| CouplingError::MalformedElement {
            mesh: self.id,
            reason: format!("quad corners {vertices:?} are collinear"),
        })?;
        let ring = order.map(|k| vertices[k]);
        let mut edges = [EdgeId::new(0); 4];
        for (slot, (a, b)) in edges.iter_mut().zip(ring.iter().circular_tuple_windows()) {
            *slot = self.find_or_push_edge(*a, *b)?;
        }
        self.push_quad(edges)
    }

    fn push_face(&mut self, face: Face) -> FaceId {
        let id = FaceId::from_index(self.faces.len());
        self.faces.push(face);
        id
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    fn missing(&self, kind: &'static str, id: u32) -> CouplingError {
        CouplingError::InvalidReference {
            mesh: self.id,
            kind,
            id,
        }
    }

    fn check_vertex(&self, v: VertexId) -> Result<(), CouplingError> {
        if self.contains_vertex(v) {
            Ok(())
        } else {
            Err(self.missing("vertex", v.get()))
        }
    }

    fn check_position(&self, position: &[f64]) -> Result<(), CouplingError> {
        if position.len() == self.dimension {
            Ok(())
        } else {
            Err(CouplingError::DimensionMismatch {
                expected: self.dimension,
                found: position.len(),
            })
        }
    }

    fn check_distinct(&self, vertices: &[VertexId]) -> Result<(), CouplingError> {
        for &v in vertices {
            self.check_vertex(v)?;
        }
        if vertices.iter().all_unique() {
            Ok(())
        } else {
            Err(CouplingError::MalformedElement {
                mesh: self.id,
                reason: format!("repeated vertex in {vertices:?}"),
            })
        }
    }

    /// Edges must exist and chain into one closed loop through distinct
    /// vertices.
    fn check_closed(&self, edges: &[EdgeId]) -> Result<(), CouplingError> {
        let mut ends = Vec::with_capacity(edges.len());
        for &e in edges {
            ends.push(self.edge(e)?);
        }
        let malformed = |reason: &str| CouplingError::MalformedElement {
            mesh: self.id,
            reason: format!("{reason}: edges {edges:?}"),
        };

        let mut used = vec![false; ends.len()];
        used[0] = true;
        let [start, mut current] = ends[0];
        let mut visited = vec![start];
        for _ in 1..ends.len() {
            let next = (0..ends.len())
                .find(|&k| !used[k] && ends[k].contains(&current))
                .ok_or_else(|| malformed("edges do not form a chain"))?;
            used[next] = true;
            if visited.contains(&current) {
                return Err(malformed("loop revisits a vertex"));
            }
            visited.push(current);
            let [p, q] = ends[next];
            current = if p == current { q } else { p };
        }
        if current != start {
            return Err(malformed("edges do not close"));
        }
        Ok(())
    }

    /// Element counts, marking where a creation call started.
    pub(crate) fn watermark(&self) -> Watermark {
        Watermark {
            edges: self.edges.len(),
            faces: self.faces.len(),
        }
    }

    /// Checks the elements added since `mark`; older elements are trusted.
    pub(crate) fn validate_since(&self, mark: Watermark) -> Result<(), CouplingError> {
        if self.coords.len() % self.dimension != 0 {
            return Err(CouplingError::BlockLengthMismatch {
                expected: self.coords.len().next_multiple_of(self.dimension),
                found: self.coords.len(),
            });
        }
        for (index, &[a, b]) in self.edges.iter().enumerate().skip(mark.edges) {
            self.check_vertex(a)?;
            self.check_vertex(b)?;
            let key = unordered(a, b);
            let first = self
                .edge_lookup
                .get(&key)
                .ok_or_else(|| self.missing("edge", index as u32))?;
            let ends = self.edge(*first)?;
            if unordered(ends[0], ends[1]) != key {
                return Err(self.missing("edge", first.get()));
            }
        }
        for face in self.faces.iter().skip(mark.faces) {
            for &e in face.edges() {
                self.edge(e)?;
            }
        }
        Ok(())
    }

    pub(crate) fn validate(&self) -> Result<(), CouplingError> {
        self.validate_since(Watermark::default())?;
        for (&(a, b), &e) in &self.edge_lookup {
            let ends = self.edge(e)?;
            if unordered(ends[0], ends[1]) != (a, b) {
                return Err(self.missing("edge", e.get()));
            }
        }
        Ok(())
    }
}
