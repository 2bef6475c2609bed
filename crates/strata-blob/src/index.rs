use std::collections::HashMap;
use std::sync::RwLock;

use strata_types::{ContentHash, NodeId, ShareId, UserId};

use crate::entry::{BlobEntry, OwnerRef, ShareRef};
use crate::error::{BlobError, BlobResult};

/// Result of registering a strong reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefOutcome {
    /// A new entry was created for novel content.
    Created,
    /// An entry already existed; the reference was added to it.
    Deduplicated,
}

/// Result of releasing a reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Other references remain; the bytes stay.
    Retained,
    /// Both reference sets drained; the entry was removed and the caller
    /// must erase the physical bytes. Returned to exactly one caller.
    Erased,
    /// The reference was not present on the entry.
    NotReferenced,
}

/// Index backend for blob entries, keyed by content digest.
///
/// Every mutating method is atomic: the existence check and the reference
/// update happen inside one critical section, never as a read-then-write
/// pair across calls. This is what makes N concurrent stores of the same
/// digest yield a reference set of size N, and what makes erasure fire
/// exactly once.
pub trait BlobIndex: Send + Sync {
    /// Read an entry by digest. Returns `Ok(None)` if absent.
    fn get(&self, hash: &ContentHash) -> BlobResult<Option<BlobEntry>>;

    /// Register a strong reference, creating the entry if the digest is new.
    ///
    /// Idempotent per `(node, owner)` pair: re-registering an existing
    /// reference reports [`RefOutcome::Deduplicated`] without growing the set.
    fn upsert_ref(&self, hash: &ContentHash, size: u64, r: OwnerRef) -> BlobResult<RefOutcome>;

    /// Remove a strong reference. When both reference sets drain, the entry
    /// is removed and [`ReleaseOutcome::Erased`] is returned to this caller
    /// only.
    fn release_ref(
        &self,
        hash: &ContentHash,
        node: &NodeId,
        owner: &UserId,
    ) -> BlobResult<ReleaseOutcome>;

    /// Register a secondary share reference. Fails `NotFound` if no entry
    /// exists for the digest.
    fn add_share_ref(&self, hash: &ContentHash, r: ShareRef) -> BlobResult<()>;

    /// Remove a secondary share reference, with the same drain semantics as
    /// [`release_ref`](Self::release_ref).
    fn remove_share_ref(
        &self,
        hash: &ContentHash,
        node: &NodeId,
        share: &ShareId,
    ) -> BlobResult<ReleaseOutcome>;

    /// Number of distinct digests currently indexed.
    fn len(&self) -> BlobResult<usize>;

    /// Returns `true` if no digests are indexed.
    fn is_empty(&self) -> BlobResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// In-memory, HashMap-based blob index.
///
/// All entries live behind a single `RwLock`; each mutating method takes
/// the write lock once and performs the full read-modify-write inside it.
pub struct InMemoryBlobIndex {
    entries: RwLock<HashMap<ContentHash, BlobEntry>>,
}

impl InMemoryBlobIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryBlobIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobIndex for InMemoryBlobIndex {
    fn get(&self, hash: &ContentHash) -> BlobResult<Option<BlobEntry>> {
        let map = self.entries.read().expect("blob index lock poisoned");
        Ok(map.get(hash).cloned())
    }

    fn upsert_ref(&self, hash: &ContentHash, size: u64, r: OwnerRef) -> BlobResult<RefOutcome> {
        let mut map = self.entries.write().expect("blob index lock poisoned");
        match map.get_mut(hash) {
            Some(entry) => {
                entry.owner_refs.insert(r);
                Ok(RefOutcome::Deduplicated)
            }
            None => {
                let mut entry = BlobEntry::new(*hash, size);
                entry.owner_refs.insert(r);
                map.insert(*hash, entry);
                Ok(RefOutcome::Created)
            }
        }
    }

    fn release_ref(
        &self,
        hash: &ContentHash,
        node: &NodeId,
        owner: &UserId,
    ) -> BlobResult<ReleaseOutcome> {
        let mut map = self.entries.write().expect("blob index lock poisoned");
        let entry = map.get_mut(hash).ok_or(BlobError::NotFound(*hash))?;
        let target = OwnerRef::new(*node, owner.clone());
        if !entry.owner_refs.remove(&target) {
            return Ok(ReleaseOutcome::NotReferenced);
        }
        if entry.is_unreferenced() {
            map.remove(hash);
            return Ok(ReleaseOutcome::Erased);
        }
        Ok(ReleaseOutcome::Retained)
    }

    fn add_share_ref(&self, hash: &ContentHash, r: ShareRef) -> BlobResult<()> {
        let mut map = self.entries.write().expect("blob index lock poisoned");
        let entry = map.get_mut(hash).ok_or(BlobError::NotFound(*hash))?;
        entry.share_refs.insert(r);
        Ok(())
    }

    fn remove_share_ref(
        &self,
        hash: &ContentHash,
        node: &NodeId,
        share: &ShareId,
    ) -> BlobResult<ReleaseOutcome> {
        let mut map = self.entries.write().expect("blob index lock poisoned");
        let entry = map.get_mut(hash).ok_or(BlobError::NotFound(*hash))?;
        let target = ShareRef::new(*node, share.clone());
        if !entry.share_refs.remove(&target) {
            return Ok(ReleaseOutcome::NotReferenced);
        }
        if entry.is_unreferenced() {
            map.remove(hash);
            return Ok(ReleaseOutcome::Erased);
        }
        Ok(ReleaseOutcome::Retained)
    }

    fn len(&self) -> BlobResult<usize> {
        Ok(self.entries.read().expect("blob index lock poisoned").len())
    }
}

impl std::fmt::Debug for InMemoryBlobIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobIndex")
            .field("entry_count", &self.len().unwrap_or(0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(n: &str) -> UserId {
        UserId::from(n)
    }

    // -----------------------------------------------------------------------
    // Reference registration
    // -----------------------------------------------------------------------

    #[test]
    fn first_ref_creates_entry() {
        let index = InMemoryBlobIndex::new();
        let hash = ContentHash::of(b"data");
        let outcome = index
            .upsert_ref(&hash, 4, OwnerRef::new(NodeId::generate(), user("u1")))
            .unwrap();
        assert_eq!(outcome, RefOutcome::Created);
        assert_eq!(index.get(&hash).unwrap().unwrap().ref_count(), 1);
    }

    #[test]
    fn second_ref_deduplicates() {
        let index = InMemoryBlobIndex::new();
        let hash = ContentHash::of(b"data");
        index
            .upsert_ref(&hash, 4, OwnerRef::new(NodeId::generate(), user("u1")))
            .unwrap();
        let outcome = index
            .upsert_ref(&hash, 4, OwnerRef::new(NodeId::generate(), user("u1")))
            .unwrap();
        assert_eq!(outcome, RefOutcome::Deduplicated);
        assert_eq!(index.get(&hash).unwrap().unwrap().ref_count(), 2);
        assert_eq!(index.len().unwrap(), 1);
    }

    #[test]
    fn reregistering_same_pair_does_not_grow_set() {
        let index = InMemoryBlobIndex::new();
        let hash = ContentHash::of(b"data");
        let r = OwnerRef::new(NodeId::generate(), user("u1"));
        index.upsert_ref(&hash, 4, r.clone()).unwrap();
        index.upsert_ref(&hash, 4, r).unwrap();
        assert_eq!(index.get(&hash).unwrap().unwrap().ref_count(), 1);
    }

    // -----------------------------------------------------------------------
    // Release semantics
    // -----------------------------------------------------------------------

    #[test]
    fn release_last_ref_erases() {
        let index = InMemoryBlobIndex::new();
        let hash = ContentHash::of(b"data");
        let node = NodeId::generate();
        index
            .upsert_ref(&hash, 4, OwnerRef::new(node, user("u1")))
            .unwrap();
        let outcome = index.release_ref(&hash, &node, &user("u1")).unwrap();
        assert_eq!(outcome, ReleaseOutcome::Erased);
        assert!(index.get(&hash).unwrap().is_none());
    }

    #[test]
    fn release_with_remaining_ref_retains() {
        let index = InMemoryBlobIndex::new();
        let hash = ContentHash::of(b"data");
        let a = NodeId::generate();
        let b = NodeId::generate();
        index.upsert_ref(&hash, 4, OwnerRef::new(a, user("u1"))).unwrap();
        index.upsert_ref(&hash, 4, OwnerRef::new(b, user("u1"))).unwrap();
        let outcome = index.release_ref(&hash, &a, &user("u1")).unwrap();
        assert_eq!(outcome, ReleaseOutcome::Retained);
        assert_eq!(index.get(&hash).unwrap().unwrap().ref_count(), 1);
    }

    #[test]
    fn release_unknown_ref_reports_not_referenced() {
        let index = InMemoryBlobIndex::new();
        let hash = ContentHash::of(b"data");
        index
            .upsert_ref(&hash, 4, OwnerRef::new(NodeId::generate(), user("u1")))
            .unwrap();
        let outcome = index
            .release_ref(&hash, &NodeId::generate(), &user("u2"))
            .unwrap();
        assert_eq!(outcome, ReleaseOutcome::NotReferenced);
    }

    #[test]
    fn release_missing_entry_fails() {
        let index = InMemoryBlobIndex::new();
        let err = index
            .release_ref(&ContentHash::of(b"ghost"), &NodeId::generate(), &user("u1"))
            .unwrap_err();
        assert!(matches!(err, BlobError::NotFound(_)));
    }

    // -----------------------------------------------------------------------
    // Share references
    // -----------------------------------------------------------------------

    #[test]
    fn share_ref_prevents_erasure() {
        let index = InMemoryBlobIndex::new();
        let hash = ContentHash::of(b"shared");
        let node = NodeId::generate();
        let share = ShareId::ephemeral();
        index
            .upsert_ref(&hash, 6, OwnerRef::new(node, user("u1")))
            .unwrap();
        index
            .add_share_ref(&hash, ShareRef::new(node, share.clone()))
            .unwrap();

        // Dropping the strong ref keeps the entry alive through the share.
        let outcome = index.release_ref(&hash, &node, &user("u1")).unwrap();
        assert_eq!(outcome, ReleaseOutcome::Retained);

        // Dropping the share ref drains the entry.
        let outcome = index.remove_share_ref(&hash, &node, &share).unwrap();
        assert_eq!(outcome, ReleaseOutcome::Erased);
        assert!(index.get(&hash).unwrap().is_none());
    }

    #[test]
    fn share_ref_on_missing_entry_fails() {
        let index = InMemoryBlobIndex::new();
        let err = index
            .add_share_ref(
                &ContentHash::of(b"ghost"),
                ShareRef::new(NodeId::generate(), ShareId::ephemeral()),
            )
            .unwrap_err();
        assert!(matches!(err, BlobError::NotFound(_)));
    }

    // -----------------------------------------------------------------------
    // Concurrency: no lost increments, erase fires once
    // -----------------------------------------------------------------------

    #[test]
    fn concurrent_upserts_never_lose_an_increment() {
        use std::sync::Arc;
        use std::thread;

        let index = Arc::new(InMemoryBlobIndex::new());
        let hash = ContentHash::of(b"popular content");

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let index = Arc::clone(&index);
                thread::spawn(move || {
                    index
                        .upsert_ref(
                            &hash,
                            15,
                            OwnerRef::new(NodeId::generate(), UserId::from(format!("u{i}"))),
                        )
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread should not panic");
        }

        assert_eq!(index.get(&hash).unwrap().unwrap().ref_count(), 16);
    }

    #[test]
    fn concurrent_releases_erase_exactly_once() {
        use std::sync::Arc;
        use std::thread;

        let index = Arc::new(InMemoryBlobIndex::new());
        let hash = ContentHash::of(b"contended");
        let refs: Vec<(NodeId, UserId)> = (0..8)
            .map(|i| (NodeId::generate(), UserId::from(format!("u{i}"))))
            .collect();
        for (node, owner) in &refs {
            index
                .upsert_ref(&hash, 9, OwnerRef::new(*node, owner.clone()))
                .unwrap();
        }

        let handles: Vec<_> = refs
            .into_iter()
            .map(|(node, owner)| {
                let index = Arc::clone(&index);
                thread::spawn(move || index.release_ref(&hash, &node, &owner).unwrap())
            })
            .collect();

        let outcomes: Vec<ReleaseOutcome> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        let erased = outcomes
            .iter()
            .filter(|o| **o == ReleaseOutcome::Erased)
            .count();
        assert_eq!(erased, 1);
        assert!(index.get(&hash).unwrap().is_none());
    }
}
