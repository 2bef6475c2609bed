use serde::{Deserialize, Serialize};
use strata_types::{NodeId, Timestamp, UserId};

/// The mutation a delta record describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Rename,
    Move,
    Copy,
    Delete,
    Restore,
    /// Permanent (force) deletion; irreversible.
    Purge,
    /// Share rules on the node changed.
    Share,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Rename => "rename",
            Self::Move => "move",
            Self::Copy => "copy",
            Self::Delete => "delete",
            Self::Restore => "restore",
            Self::Purge => "purge",
            Self::Share => "share",
        };
        write!(f, "{s}")
    }
}

/// One entry in the change feed.
///
/// Records are append-only: once committed they are never mutated or
/// deleted (bounded retention drops whole records off the tail, nothing
/// else). The snapshot fields carry what a sync client needs to reconcile
/// without a follow-up node fetch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaRecord {
    /// Globally ordered position, assigned by the log on append.
    /// Zero until committed.
    pub position: u64,
    /// The mutated node.
    pub node: NodeId,
    /// Owner of the node at commit time.
    pub owner: UserId,
    /// The mutation.
    pub operation: Operation,
    /// Commit wall-clock time.
    pub timestamp: Timestamp,
    /// Node name at commit time.
    pub name: String,
    /// Parent collection at commit time (`None` for root-level nodes).
    pub parent: Option<NodeId>,
    /// Extra reconciliation payload (e.g. previous path on move).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl DeltaRecord {
    /// Build an uncommitted record (position is assigned on append).
    pub fn new(
        node: NodeId,
        owner: UserId,
        operation: Operation,
        timestamp: Timestamp,
        name: impl Into<String>,
        parent: Option<NodeId>,
    ) -> Self {
        Self {
            position: 0,
            node,
            owner,
            operation,
            timestamp,
            name: name.into(),
            parent,
            extra: None,
        }
    }

    /// Attach a reconciliation payload.
    pub fn with_extra(mut self, extra: serde_json::Value) -> Self {
        self.extra = Some(extra);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_display() {
        assert_eq!(format!("{}", Operation::Create), "create");
        assert_eq!(format!("{}", Operation::Purge), "purge");
    }

    #[test]
    fn record_serde_omits_empty_extra() {
        let r = DeltaRecord::new(
            NodeId::generate(),
            UserId::from("u1"),
            Operation::Create,
            Timestamp::from_millis(1),
            "a.txt",
            None,
        );
        let json = serde_json::to_value(&r).unwrap();
        assert!(json.get("extra").is_none());
        assert_eq!(json["operation"], "create");
    }

    #[test]
    fn extra_roundtrips() {
        let r = DeltaRecord::new(
            NodeId::generate(),
            UserId::from("u1"),
            Operation::Move,
            Timestamp::from_millis(1),
            "a.txt",
            None,
        )
        .with_extra(serde_json::json!({"previous_parent": null}));
        let json = serde_json::to_string(&r).unwrap();
        let back: DeltaRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
