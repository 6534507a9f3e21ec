//! Error types for remeshcrate

use thiserror::Error;

/// Main error type for remeshcrate operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Malformed mesh: face {face} {reason}")]
    MalformedMesh { face: usize, reason: String },

    #[error("Edge budget exhausted: {performed} of {requested} collapses performed")]
    BudgetExceeded { requested: usize, performed: usize },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Unknown vertex id {0}")]
    UnknownVertex(u32),

    #[error("Unknown edge id {0}")]
    UnknownEdge(u32),

    #[error("Cannot collapse vertex {0} into itself")]
    InvalidCollapse(u32),

    #[error("Algorithm error: {0}")]
    Algorithm(String),
}

/// Result type alias for remeshcrate operations
pub type Result<T> = std::result::Result<T, Error>;
