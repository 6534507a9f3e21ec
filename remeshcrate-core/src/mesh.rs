//! Mesh data structures and functionality

use crate::error::Error;
use crate::point::*;
use crate::Result;
use serde::{Deserialize, Serialize};

/// A triangle mesh with vertices and faces
///
/// This is the loaded form of a surface as handed over by a file parser:
/// positions plus zero-based vertex index triples. The face list may be empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub vertices: Vec<Point3f>,
    pub faces: Vec<[usize; 3]>,
}

impl TriangleMesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
        }
    }

    /// Create a mesh from vertices and faces
    pub fn from_vertices_and_faces(vertices: Vec<Point3f>, faces: Vec<[usize; 3]>) -> Self {
        Self { vertices, faces }
    }

    /// Create a mesh from flat position and index buffers.
    ///
    /// `indices` holds three entries per triangle. A trailing partial triangle
    /// is reported as [`Error::MalformedMesh`].
    pub fn from_buffers(positions: &[[f32; 3]], indices: &[u32]) -> Result<Self> {
        if indices.len() % 3 != 0 {
            return Err(Error::MalformedMesh {
                face: indices.len() / 3,
                reason: format!(
                    "index buffer length {} is not a multiple of 3",
                    indices.len()
                ),
            });
        }

        let vertices = positions
            .iter()
            .map(|p| Point3f::new(p[0], p[1], p[2]))
            .collect();
        let faces = indices
            .chunks_exact(3)
            .map(|c| [c[0] as usize, c[1] as usize, c[2] as usize])
            .collect();

        Ok(Self { vertices, faces })
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of faces
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if the mesh is empty
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Add a vertex to the mesh
    pub fn add_vertex(&mut self, vertex: Point3f) -> usize {
        let index = self.vertices.len();
        self.vertices.push(vertex);
        index
    }

    /// Add a face to the mesh
    pub fn add_face(&mut self, face: [usize; 3]) {
        self.faces.push(face);
    }

    /// Check that every face references three distinct, existing vertices.
    ///
    /// Returns the first offending face as [`Error::MalformedMesh`].
    pub fn validate(&self) -> Result<()> {
        let n = self.vertices.len();
        for (fi, face) in self.faces.iter().enumerate() {
            if let Some(&bad) = face.iter().find(|&&v| v >= n) {
                return Err(Error::MalformedMesh {
                    face: fi,
                    reason: format!("references vertex {} but the mesh has {} vertices", bad, n),
                });
            }
            if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
                return Err(Error::MalformedMesh {
                    face: fi,
                    reason: format!("repeats a vertex: {:?}", face),
                });
            }
        }
        Ok(())
    }

    /// Clear the mesh
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.faces.clear();
    }
}

impl Default for TriangleMesh {
    fn default() -> Self {
        Self::new()
    }
}
