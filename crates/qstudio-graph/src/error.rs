//! Error types for the program graph.

use thiserror::Error;

use crate::id::NodeId;
use crate::params::NodeKind;

/// Errors that can occur in graph operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GraphError {
    /// Node not found in the graph.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// A node with this ID already exists.
    #[error("Duplicate node: {0}")]
    DuplicateNode(NodeId),

    /// Edge not found in the graph.
    #[error("Edge not found: {0}")]
    EdgeNotFound(String),

    /// Adding the edge would create a cycle.
    #[error("Edge {source_id} -> {target} would create a cycle")]
    Cycle { source_id: NodeId, target: NodeId },

    /// Parameter value does not fit the kind's schema.
    #[error("Invalid value for {kind} parameter '{name}': {reason}")]
    InvalidParameter {
        kind: NodeKind,
        name: String,
        reason: String,
    },

    /// Template manifest could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Template manifest could not be parsed.
    #[error("Template manifest error: {0}")]
    Manifest(String),
}

/// Result type for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

impl From<serde_yaml_ng::Error> for GraphError {
    fn from(e: serde_yaml_ng::Error) -> Self {
        GraphError::Manifest(e.to_string())
    }
}
