//! Connectivity store
//!
//! Vertices, triangles and candidate edges refer to each other by stable
//! integer id. Every vertex carries its neighbor set and incident-triangle set
//! as explicit back-references; the mutators in [`crate::operators`] keep both
//! sides of every relationship in step.

use crate::arena::Arena;
use itertools::Itertools;
use nalgebra::Matrix4;
use remeshcrate_core::{Error, MeshBuffer, Point3f, Result, TriangleMesh};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

pub type VertexId = u32;
pub type TriangleId = u32;
pub type EdgeId = u32;

/// A mesh vertex together with its adjacency back-references.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub(crate) id: VertexId,
    pub(crate) position: Point3f,
    pub(crate) quadric: Matrix4<f64>,
    pub(crate) neighbors: BTreeSet<VertexId>,
    pub(crate) incident_triangles: BTreeSet<TriangleId>,
}

impl Vertex {
    pub(crate) fn new(id: VertexId, position: Point3f) -> Self {
        Self {
            id,
            position,
            quadric: Matrix4::zeros(),
            neighbors: BTreeSet::new(),
            incident_triangles: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> VertexId {
        self.id
    }

    pub fn position(&self) -> Point3f {
        self.position
    }

    pub fn quadric(&self) -> &Matrix4<f64> {
        &self.quadric
    }

    pub fn neighbors(&self) -> &BTreeSet<VertexId> {
        &self.neighbors
    }

    pub fn incident_triangles(&self) -> &BTreeSet<TriangleId> {
        &self.incident_triangles
    }

    /// Number of neighbors
    pub fn valence(&self) -> usize {
        self.neighbors.len()
    }
}

/// A triangle; its vertex ids are kept in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triangle {
    id: TriangleId,
    vertices: [VertexId; 3],
}

impl Triangle {
    pub(crate) fn new(id: TriangleId, mut vertices: [VertexId; 3]) -> Self {
        vertices.sort_unstable();
        Self { id, vertices }
    }

    pub fn id(&self) -> TriangleId {
        self.id
    }

    pub fn vertices(&self) -> [VertexId; 3] {
        self.vertices
    }

    pub fn contains(&self, v: VertexId) -> bool {
        self.vertices.contains(&v)
    }

    /// The vertex that is neither `a` nor `b`, if the triangle holds both.
    pub fn opposite(&self, a: VertexId, b: VertexId) -> Option<VertexId> {
        if !self.contains(a) || !self.contains(b) {
            return None;
        }
        self.vertices.iter().copied().find(|&v| v != a && v != b)
    }

    pub(crate) fn set_vertices(&mut self, mut vertices: [VertexId; 3]) {
        vertices.sort_unstable();
        self.vertices = vertices;
    }

    /// Replace `from` with `to` and restore ascending order.
    pub(crate) fn substitute(&mut self, from: VertexId, to: VertexId) {
        for v in self.vertices.iter_mut() {
            if *v == from {
                *v = to;
            }
        }
        self.vertices.sort_unstable();
    }
}

/// A candidate edge; `vertices().0 < vertices().1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    id: EdgeId,
    vertices: (VertexId, VertexId),
    pub(crate) cost: f32,
}

impl Edge {
    pub(crate) fn new(id: EdgeId, a: VertexId, b: VertexId) -> Self {
        Self {
            id,
            vertices: ordered(a, b),
            cost: 0.0,
        }
    }

    pub fn id(&self) -> EdgeId {
        self.id
    }

    pub fn vertices(&self) -> (VertexId, VertexId) {
        self.vertices
    }

    pub fn v0(&self) -> VertexId {
        self.vertices.0
    }

    pub fn v1(&self) -> VertexId {
        self.vertices.1
    }

    pub fn cost(&self) -> f32 {
        self.cost
    }

    pub fn contains(&self, v: VertexId) -> bool {
        self.vertices.0 == v || self.vertices.1 == v
    }

    pub(crate) fn set_vertices(&mut self, a: VertexId, b: VertexId) {
        self.vertices = ordered(a, b);
    }
}

#[inline]
pub(crate) fn ordered(a: VertexId, b: VertexId) -> (VertexId, VertexId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Owner of the authoritative vertex, triangle and edge sets.
pub struct ConnectivityStore {
    pub(crate) vertices: Arena<Vertex>,
    pub(crate) triangles: Arena<Triangle>,
    pub(crate) edges: Arena<Edge>,
    /// Unordered vertex pair -> candidate edge
    pub(crate) edge_index: HashMap<(VertexId, VertexId), EdgeId>,
}

impl ConnectivityStore {
    /// Build the store from an indexed mesh.
    ///
    /// The mesh is validated before anything is built. Vertex `i` of the mesh
    /// gets id `i`, face `j` becomes triangle `j`, and the candidate edges are
    /// every distinct vertex pair sharing a face, numbered in ascending pair
    /// order.
    pub fn from_mesh(mesh: &TriangleMesh) -> Result<Self> {
        mesh.validate()?;

        let mut vertices = Arena::with_capacity(mesh.vertex_count());
        for p in &mesh.vertices {
            vertices.insert_with(|id| Vertex::new(id, *p));
        }

        let mut triangles = Arena::with_capacity(mesh.face_count());
        let mut pairs = BTreeSet::new();
        for face in &mesh.faces {
            let ids = [face[0] as VertexId, face[1] as VertexId, face[2] as VertexId];
            let tri_id = triangles.insert_with(|id| Triangle::new(id, ids));
            for (a, b) in ids.iter().copied().tuple_combinations() {
                pairs.insert(ordered(a, b));
                if let Some(va) = vertices.get_mut(a) {
                    va.neighbors.insert(b);
                }
                if let Some(vb) = vertices.get_mut(b) {
                    vb.neighbors.insert(a);
                }
            }
            for v in ids {
                if let Some(vertex) = vertices.get_mut(v) {
                    vertex.incident_triangles.insert(tri_id);
                }
            }
        }

        let mut store = Self {
            vertices,
            triangles,
            edges: Arena::with_capacity(pairs.len()),
            edge_index: HashMap::with_capacity(pairs.len()),
        };
        for (a, b) in pairs {
            store.insert_edge(a, b);
        }

        debug!(
            vertices = store.vertex_count(),
            triangles = store.triangle_count(),
            edges = store.edge_count(),
            "built connectivity store"
        );
        Ok(store)
    }

    /// Build the store from flat position and index buffers.
    pub fn from_buffers(positions: &[[f32; 3]], indices: &[u32]) -> Result<Self> {
        Self::from_mesh(&TriangleMesh::from_buffers(positions, indices)?)
    }

    // ---- Lookup ----

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(id)
    }

    pub fn triangle(&self, id: TriangleId) -> Option<&Triangle> {
        self.triangles.get(id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    /// Candidate edge joining `a` and `b`, in either order.
    pub fn edge_between(&self, a: VertexId, b: VertexId) -> Option<&Edge> {
        self.edge_index
            .get(&ordered(a, b))
            .and_then(|&id| self.edges.get(id))
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Live vertices in ascending id order
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> + '_ {
        self.vertices.iter().map(|(_, v)| v)
    }

    /// Live triangles in ascending id order
    pub fn triangles(&self) -> impl Iterator<Item = &Triangle> + '_ {
        self.triangles.iter().map(|(_, t)| t)
    }

    /// Candidate edges in ascending id order
    pub fn edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().map(|(_, e)| e)
    }

    pub fn vertex_ids(&self) -> Vec<VertexId> {
        self.vertices.ids()
    }

    pub fn edge_ids(&self) -> Vec<EdgeId> {
        self.edges.ids()
    }

    pub(crate) fn next_edge_from(&self, from: EdgeId) -> Option<EdgeId> {
        self.edges.next_live_from(from)
    }

    pub(crate) fn vertex_checked(&self, id: VertexId) -> Result<&Vertex> {
        self.vertices.get(id).ok_or(Error::UnknownVertex(id))
    }

    pub(crate) fn edge_checked(&self, id: EdgeId) -> Result<&Edge> {
        self.edges.get(id).ok_or(Error::UnknownEdge(id))
    }

    pub fn position(&self, id: VertexId) -> Result<Point3f> {
        Ok(self.vertex_checked(id)?.position)
    }

    /// Euclidean length of a candidate edge.
    pub fn edge_length(&self, id: EdgeId) -> Result<f32> {
        let (a, b) = self.edge_checked(id)?.vertices;
        Ok((self.position(a)? - self.position(b)?).norm())
    }

    /// Arithmetic mean length over the candidate edge set, `None` when empty.
    pub fn mean_edge_length(&self) -> Option<f32> {
        if self.edges.len() == 0 {
            return None;
        }
        let mut total = 0.0f64;
        for (_, edge) in self.edges.iter() {
            let (a, b) = edge.vertices;
            match (self.vertices.get(a), self.vertices.get(b)) {
                (Some(va), Some(vb)) => total += (va.position - vb.position).norm() as f64,
                _ => return None,
            }
        }
        Some((total / self.edges.len() as f64) as f32)
    }

    /// Minimum-cost candidate edge; on equal costs the lowest id wins.
    pub fn lowest_cost_edge(&self) -> Option<EdgeId> {
        let mut best: Option<(EdgeId, f32)> = None;
        for (id, edge) in self.edges.iter() {
            match best {
                Some((_, cost)) if edge.cost >= cost => {}
                _ => best = Some((id, edge.cost)),
            }
        }
        best.map(|(id, _)| id)
    }

    // ---- Edge bookkeeping ----

    /// Append a candidate edge for `a`-`b` (cost 0). An existing edge for the
    /// same pair is returned unchanged.
    pub(crate) fn insert_edge(&mut self, a: VertexId, b: VertexId) -> EdgeId {
        let key = ordered(a, b);
        if let Some(&id) = self.edge_index.get(&key) {
            return id;
        }
        let id = self.edges.insert_with(|id| Edge::new(id, key.0, key.1));
        self.edge_index.insert(key, id);
        id
    }

    pub(crate) fn remove_edge(&mut self, id: EdgeId) -> Option<Edge> {
        let edge = self.edges.remove(id)?;
        self.edge_index.remove(&edge.vertices);
        Some(edge)
    }

    /// Rewrite an edge record in place to join `a` and `b`.
    pub(crate) fn rekey_edge(&mut self, id: EdgeId, a: VertexId, b: VertexId) {
        if let Some(edge) = self.edges.get_mut(id) {
            self.edge_index.remove(&edge.vertices);
            edge.set_vertices(a, b);
            self.edge_index.insert(edge.vertices, id);
        }
    }

    pub(crate) fn set_edge_cost(&mut self, id: EdgeId, cost: f32) {
        if let Some(edge) = self.edges.get_mut(id) {
            edge.cost = cost;
        }
    }

    // ---- Invariants ----

    /// Vertices adjacent to `v` through its incident triangles.
    pub fn triangle_neighbors(&self, v: VertexId) -> BTreeSet<VertexId> {
        let mut result = BTreeSet::new();
        if let Some(vertex) = self.vertices.get(v) {
            for &t in &vertex.incident_triangles {
                if let Some(tri) = self.triangles.get(t) {
                    result.extend(tri.vertices.iter().copied().filter(|&u| u != v));
                }
            }
        }
        result
    }

    /// Whether `v`'s neighbor set is exactly its triangle-derived adjacency.
    pub fn neighbors_match_triangles(&self, v: VertexId) -> bool {
        match self.vertices.get(v) {
            Some(vertex) => vertex.neighbors == self.triangle_neighbors(v),
            None => false,
        }
    }

    /// Verify every structural invariant, reporting the first violation.
    pub fn check_invariants(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::Algorithm(msg));

        for (tid, tri) in self.triangles.iter() {
            let [a, b, c] = tri.vertices;
            if !(a < b && b < c) {
                return fail(format!("triangle {} is not strictly ascending: {:?}", tid, tri.vertices));
            }
            for v in tri.vertices {
                match self.vertices.get(v) {
                    None => return fail(format!("triangle {} references dead vertex {}", tid, v)),
                    Some(vertex) if !vertex.incident_triangles.contains(&tid) => {
                        return fail(format!("vertex {} does not list incident triangle {}", v, tid))
                    }
                    _ => {}
                }
            }
        }

        for (vid, vertex) in self.vertices.iter() {
            if vertex.id != vid {
                return fail(format!("vertex slot {} holds id {}", vid, vertex.id));
            }
            if vertex.neighbors.contains(&vid) {
                return fail(format!("vertex {} lists itself as a neighbor", vid));
            }
            for &n in &vertex.neighbors {
                match self.vertices.get(n) {
                    None => return fail(format!("vertex {} lists dead neighbor {}", vid, n)),
                    Some(other) if !other.neighbors.contains(&vid) => {
                        return fail(format!("neighbor relation {} -> {} is not mirrored", vid, n))
                    }
                    _ => {}
                }
            }
            for &t in &vertex.incident_triangles {
                match self.triangles.get(t) {
                    None => return fail(format!("vertex {} lists dead triangle {}", vid, t)),
                    Some(tri) if !tri.contains(vid) => {
                        return fail(format!("vertex {} lists triangle {} which does not contain it", vid, t))
                    }
                    _ => {}
                }
            }
            let derived = self.triangle_neighbors(vid);
            if let Some(missing) = derived.difference(&vertex.neighbors).next() {
                return fail(format!(
                    "vertex {} shares a triangle with {} but does not list it as a neighbor",
                    vid, missing
                ));
            }
        }

        for (eid, edge) in self.edges.iter() {
            let (a, b) = edge.vertices;
            if a >= b {
                return fail(format!("edge {} is not ordered: ({}, {})", eid, a, b));
            }
            match (self.vertices.get(a), self.vertices.get(b)) {
                (Some(va), Some(_)) if va.neighbors.contains(&b) => {}
                _ => return fail(format!("edge {} joins non-adjacent or dead vertices ({}, {})", eid, a, b)),
            }
            if self.edge_index.get(&edge.vertices) != Some(&eid) {
                return fail(format!("edge {} is missing from the pair index", eid));
            }
        }
        if self.edge_index.len() != self.edges.len() {
            return fail(format!(
                "pair index has {} entries for {} edges",
                self.edge_index.len(),
                self.edges.len()
            ));
        }

        Ok(())
    }

    // ---- Output ----

    /// Flatten live vertices (ascending id) and triangles (ascending id) into
    /// upload buffers; indices refer to positions in the vertex array.
    pub fn to_buffer(&self) -> MeshBuffer {
        let mut slot = vec![u32::MAX; self.vertices.next_id() as usize];
        let mut vertices = Vec::with_capacity(self.vertices.len());
        for (id, vertex) in self.vertices.iter() {
            slot[id as usize] = vertices.len() as u32;
            let p = vertex.position;
            vertices.push([p.x, p.y, p.z]);
        }

        let mut indices = Vec::with_capacity(self.triangles.len() * 3);
        for (_, tri) in self.triangles.iter() {
            indices.extend(tri.vertices.iter().map(|&v| slot[v as usize]));
        }

        MeshBuffer::new(vertices, indices)
    }

    /// Flatten into an indexed [`TriangleMesh`].
    pub fn to_triangle_mesh(&self) -> TriangleMesh {
        self.to_buffer().to_triangle_mesh()
    }
}
