//! Mesh simplification and remeshing algorithms
//!
//! This crate provides two passes over an indexed triangle mesh, both driven
//! through an id-indexed connectivity store:
//! - Quadric error edge collapse simplification
//! - Single-pass isotropic remeshing (collapse, split, optional flip, relocate)

mod arena;
pub mod store;
pub mod quadric_error;
pub mod operators;
pub mod edge_collapse;
pub mod remesh;
pub mod pipeline;

pub use store::*;
pub use quadric_error::*;
pub use operators::*;
pub use edge_collapse::*;
pub use remesh::*;
pub use pipeline::*;

use remeshcrate_core::{TriangleMesh, Result};

/// Simplify a mesh by reducing the number of vertices
pub trait MeshSimplifier {
    /// Simplify mesh keeping `retain_fraction` of its vertices (1.0 = no reduction, 0.0 = single vertex)
    fn simplify(&self, mesh: &TriangleMesh, retain_fraction: f32) -> Result<TriangleMesh>;
}

/// Even out the edge lengths of a mesh
pub trait MeshRemesher {
    fn remesh(&self, mesh: &TriangleMesh) -> Result<TriangleMesh>;
}
