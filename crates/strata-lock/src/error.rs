use strata_types::{ErrorKind, NodeId};

use crate::types::LockToken;

/// Errors from lock operations.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// A live lock with a different token already holds the node.
    #[error("node {node} is locked by another token")]
    Locked { node: NodeId },

    /// The supplied token does not match the current holder.
    #[error("lock token mismatch on node {node}: supplied {supplied}")]
    TokenMismatch { node: NodeId, supplied: LockToken },

    /// No live lock exists on the node.
    #[error("node {0} is not locked")]
    NotLocked(NodeId),
}

impl LockError {
    /// Classify into the shared error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Locked { .. } | Self::TokenMismatch { .. } => ErrorKind::Conflict,
            Self::NotLocked(_) => ErrorKind::NotFound,
        }
    }
}

/// Result alias for lock operations.
pub type LockResult<T> = Result<T, LockError>;
