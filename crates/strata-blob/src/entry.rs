use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strata_types::{ContentHash, NodeId, ShareId, UserId};

/// A strong reference: a file node owned by a user pointing at a blob.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerRef {
    pub node: NodeId,
    pub owner: UserId,
}

impl OwnerRef {
    pub fn new(node: NodeId, owner: UserId) -> Self {
        Self { node, owner }
    }
}

/// A secondary reference arising from share membership.
///
/// Keeps shared content alive while a shared copy exists, even after the
/// owning node releases its strong reference.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShareRef {
    pub node: NodeId,
    pub share: ShareId,
}

impl ShareRef {
    pub fn new(node: NodeId, share: ShareId) -> Self {
        Self { node, share }
    }
}

/// The per-digest index record.
///
/// One `BlobEntry` exists per unique content digest. It carries the blob
/// size and both reference sets; the bytes themselves live in the
/// [`ByteSink`](crate::ByteSink).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobEntry {
    /// Content digest, the primary dedup key.
    pub hash: ContentHash,
    /// Size of the stored content in bytes.
    pub size: u64,
    /// Strong `(node, owner)` references.
    pub owner_refs: BTreeSet<OwnerRef>,
    /// Secondary `(node, share)` references.
    pub share_refs: BTreeSet<ShareRef>,
}

impl BlobEntry {
    /// A fresh entry with no references yet.
    pub fn new(hash: ContentHash, size: u64) -> Self {
        Self {
            hash,
            size,
            owner_refs: BTreeSet::new(),
            share_refs: BTreeSet::new(),
        }
    }

    /// Total strong reference count.
    pub fn ref_count(&self) -> usize {
        self.owner_refs.len()
    }

    /// Returns `true` when both reference sets are empty and the bytes are
    /// eligible for physical erasure.
    pub fn is_unreferenced(&self) -> bool {
        self.owner_refs.is_empty() && self.share_refs.is_empty()
    }
}

/// Handle to stored content, returned by `BlobStore::store`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    /// Digest of the stored content.
    pub hash: ContentHash,
    /// Content length in bytes.
    pub size: u64,
}
