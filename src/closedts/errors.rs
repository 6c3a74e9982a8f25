//! Closed timestamp subsystem errors

use thiserror::Error;

use crate::lease::NodeId;

/// Result type for closed timestamp operations
pub type ClosedTsResult<T> = Result<T, ClosedTsError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClosedTsError {
    /// No stream could be opened to the node.
    #[error("closed timestamp stream to {node} unavailable: {reason}")]
    NodeUnreachable { node: NodeId, reason: String },

    /// Clients need a tokio runtime to run their streams on.
    #[error("closed timestamp clients must be created inside a tokio runtime")]
    NoRuntime,
}

impl ClosedTsError {
    pub fn unreachable(node: NodeId, reason: impl Into<String>) -> Self {
        Self::NodeUnreachable {
            node,
            reason: reason.into(),
        }
    }
}
