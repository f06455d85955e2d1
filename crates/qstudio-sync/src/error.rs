//! Error types for the reconciliation engine.

use qstudio_graph::GraphError;
use qstudio_oracle::OracleError;
use thiserror::Error;

/// Errors surfaced by an editing session.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    /// Graph operation failed (unknown node, invalid parameter, cycle).
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// External service failed; the graph is unchanged.
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    /// The session task has shut down.
    #[error("Session closed")]
    SessionClosed,
}

/// Result type for session operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::from(GraphError::NodeNotFound("n".into()));
        assert_eq!(err.to_string(), "Graph error: Node not found: n");

        let err = SyncError::from(OracleError::Rejected("quota".into()));
        assert_eq!(err.to_string(), "Oracle error: Request rejected: quota");
    }
}
