use serde::{Deserialize, Serialize};
use strata_types::{ContentHash, NodeId, ShareId, Timestamp, UserId};

/// Classification of node mutation events.
///
/// This enum is closed on purpose: collaborators subscribe to variants,
/// they are never discovered by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FsEventKind {
    NodeCreated,
    NodeUpdated,
    NodeRenamed,
    NodeMoved,
    NodeCopied,
    NodeDeleted,
    NodeRestored,
    NodePurged,
    ShareCreated,
    ShareRemoved,
}

impl std::fmt::Display for FsEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NodeCreated => "NodeCreated",
            Self::NodeUpdated => "NodeUpdated",
            Self::NodeRenamed => "NodeRenamed",
            Self::NodeMoved => "NodeMoved",
            Self::NodeCopied => "NodeCopied",
            Self::NodeDeleted => "NodeDeleted",
            Self::NodeRestored => "NodeRestored",
            Self::NodePurged => "NodePurged",
            Self::ShareCreated => "ShareCreated",
            Self::ShareRemoved => "ShareRemoved",
        };
        write!(f, "{s}")
    }
}

/// Event-specific payload data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventDetail {
    /// The kind is self-describing.
    None,
    /// A rename: old and new path segment.
    Rename { from: String, to: String },
    /// A move between collections.
    Move {
        from_parent: Option<NodeId>,
        to_parent: Option<NodeId>,
    },
    /// A content change on a file.
    Content {
        hash: ContentHash,
        size: u64,
        version: u64,
    },
    /// A share lifecycle change.
    Share { share: ShareId },
}

/// One mutation event flowing through the bus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsEvent {
    /// Classification of this event.
    pub kind: FsEventKind,
    /// The mutated node.
    pub node: NodeId,
    /// Owner of the node at event time.
    pub owner: UserId,
    /// Wall-clock time of the mutation.
    pub timestamp: Timestamp,
    /// Event-specific payload.
    pub detail: EventDetail,
}

impl FsEvent {
    pub fn new(kind: FsEventKind, node: NodeId, owner: UserId, timestamp: Timestamp) -> Self {
        Self {
            kind,
            node,
            owner,
            timestamp,
            detail: EventDetail::None,
        }
    }

    /// Attach a typed payload.
    pub fn with_detail(mut self, detail: EventDetail) -> Self {
        self.detail = detail;
        self
    }
}
