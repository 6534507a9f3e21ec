//! Flat vertex/index buffers ready for GPU upload

use crate::mesh::TriangleMesh;
use crate::point::Point3f;
use serde::{Deserialize, Serialize};

/// Linear vertex and triangle-index arrays.
///
/// `indices` holds three entries per triangle; each entry is a position in
/// `vertices`, not an engine vertex id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshBuffer {
    pub vertices: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl MeshBuffer {
    pub fn new(vertices: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Iterate over index triples
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|c| [c[0], c[1], c[2]])
    }

    /// Raw bytes of the vertex array, tightly packed `f32` triples.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Raw bytes of the index array.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Convert back into an indexed [`TriangleMesh`].
    pub fn to_triangle_mesh(&self) -> TriangleMesh {
        let vertices = self
            .vertices
            .iter()
            .map(|v| Point3f::new(v[0], v[1], v[2]))
            .collect();
        let faces = self
            .triangles()
            .map(|t| [t[0] as usize, t[1] as usize, t[2] as usize])
            .collect();
        TriangleMesh::from_vertices_and_faces(vertices, faces)
    }
}
