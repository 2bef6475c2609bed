use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strata_acl::AclSet;
use strata_types::{ContentHash, NodeId, ShareId, Timestamp, UserId};

/// Content state of a file node.
///
/// `hash` and `size` always describe the blob the node currently
/// references; `version` increments on every content replace and never
/// decreases.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileState {
    pub hash: ContentHash,
    pub size: u64,
    pub version: u64,
}

/// What a node is: an inner collection or a content-bearing file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeKind {
    Collection,
    File(FileState),
}

impl NodeKind {
    pub fn is_collection(&self) -> bool {
        matches!(self, Self::Collection)
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }

    /// File content state, if this is a file.
    pub fn file(&self) -> Option<&FileState> {
        match self {
            Self::File(state) => Some(state),
            Self::Collection => None,
        }
    }
}

/// One node in the tree.
///
/// The id is immutable and survives renames, moves, and
/// soft-delete/restore cycles. `parent` is `None` for root-level nodes.
/// A non-empty `acl` makes the node a share root; `share` then carries
/// the share identity used to key secondary blob references.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub owner: UserId,
    pub name: String,
    pub kind: NodeKind,
    /// Explicit per-node rules; empty unless the node is a share root.
    #[serde(default, skip_serializing_if = "AclSet::is_empty")]
    pub acl: AclSet,
    /// Share identity, set iff `acl` is non-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share: Option<ShareId>,
    /// Soft-delete marker; `None` means live.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<Timestamp>,
    pub created: Timestamp,
    pub changed: Timestamp,
    /// Opaque per-namespace key/value data owned by external
    /// collaborators. Never interpreted here.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub app_attributes: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
}

impl Node {
    /// A fresh collection node.
    pub fn collection(
        parent: Option<NodeId>,
        owner: UserId,
        name: impl Into<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: NodeId::generate(),
            parent,
            owner,
            name: name.into(),
            kind: NodeKind::Collection,
            acl: AclSet::empty(),
            share: None,
            deleted: None,
            created: now,
            changed: now,
            app_attributes: BTreeMap::new(),
        }
    }

    /// A fresh file node at version 1.
    pub fn file(
        parent: Option<NodeId>,
        owner: UserId,
        name: impl Into<String>,
        hash: ContentHash,
        size: u64,
        now: Timestamp,
    ) -> Self {
        Self {
            id: NodeId::generate(),
            parent,
            owner,
            name: name.into(),
            kind: NodeKind::File(FileState {
                hash,
                size,
                version: 1,
            }),
            acl: AclSet::empty(),
            share: None,
            deleted: None,
            created: now,
            changed: now,
            app_attributes: BTreeMap::new(),
        }
    }

    pub fn is_live(&self) -> bool {
        self.deleted.is_none()
    }

    /// Returns `true` if the node carries its own share rules.
    pub fn is_share_root(&self) -> bool {
        !self.acl.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_file_starts_at_version_one() {
        let n = Node::file(
            None,
            UserId::from("u1"),
            "a.txt",
            ContentHash::of(b"hi"),
            2,
            Timestamp::from_millis(1),
        );
        assert_eq!(n.kind.file().unwrap().version, 1);
        assert!(n.is_live());
        assert!(!n.is_share_root());
    }

    #[test]
    fn kind_predicates() {
        let c = Node::collection(None, UserId::from("u1"), "docs", Timestamp::from_millis(1));
        assert!(c.kind.is_collection());
        assert!(!c.kind.is_file());
        assert!(c.kind.file().is_none());
    }

    #[test]
    fn serde_omits_empty_optionals() {
        let n = Node::collection(None, UserId::from("u1"), "docs", Timestamp::from_millis(1));
        let json = serde_json::to_value(&n).unwrap();
        assert!(json.get("deleted").is_none());
        assert!(json.get("acl").is_none());
        assert!(json.get("share").is_none());
        assert!(json.get("app_attributes").is_none());
        assert_eq!(json["kind"]["type"], "collection");
    }

    #[test]
    fn serde_roundtrip_with_attributes() {
        let mut n = Node::file(
            None,
            UserId::from("u1"),
            "a.txt",
            ContentHash::of(b"hi"),
            2,
            Timestamp::from_millis(1),
        );
        n.app_attributes
            .entry("sharing".to_string())
            .or_default()
            .insert("token".to_string(), serde_json::json!("abc"));
        let json = serde_json::to_string(&n).unwrap();
        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(back, n);
    }
}
