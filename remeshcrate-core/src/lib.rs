//! Core data structures for remeshcrate
//!
//! This crate provides the types shared by the simplification and remeshing
//! engine: point aliases, the indexed input mesh, the flat upload buffer the
//! engine produces, and the common error type.

pub mod point;
pub mod mesh;
pub mod buffer;
pub mod error;

pub use point::*;
pub use mesh::*;
pub use buffer::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3, Vector4, Matrix4};

/// Common result type for remeshcrate operations
pub type Result<T> = std::result::Result<T, Error>;

// Type aliases for easier imports
pub type Point = Point3f;
pub type Mesh = TriangleMesh;
