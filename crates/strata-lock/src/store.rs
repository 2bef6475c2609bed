use std::collections::HashMap;
use std::sync::RwLock;

use strata_types::NodeId;

use crate::error::LockResult;
use crate::types::Lock;

/// Storage backend for locks, one record per locked node.
///
/// The backing deployment keeps these in a TTL-indexed collection; the
/// manager layer also checks expiry lazily so a stale record never grants
/// exclusivity.
pub trait LockStore: Send + Sync {
    /// Read the lock record for a node, expired or not.
    fn get(&self, node: &NodeId) -> LockResult<Option<Lock>>;

    /// Create or replace the lock record for a node.
    fn put(&self, lock: Lock) -> LockResult<()>;

    /// Remove the lock record. Returns `true` if one existed.
    fn remove(&self, node: &NodeId) -> LockResult<bool>;

    /// Number of lock records currently stored (including expired ones not
    /// yet reaped).
    fn len(&self) -> LockResult<usize>;

    /// Returns `true` if no lock records are stored.
    fn is_empty(&self) -> LockResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// In-memory, HashMap-based lock store.
pub struct InMemoryLockStore {
    locks: RwLock<HashMap<NodeId, Lock>>,
}

impl InMemoryLockStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            locks: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryLockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LockStore for InMemoryLockStore {
    fn get(&self, node: &NodeId) -> LockResult<Option<Lock>> {
        let map = self.locks.read().expect("lock store lock poisoned");
        Ok(map.get(node).cloned())
    }

    fn put(&self, lock: Lock) -> LockResult<()> {
        let mut map = self.locks.write().expect("lock store lock poisoned");
        map.insert(lock.node, lock);
        Ok(())
    }

    fn remove(&self, node: &NodeId) -> LockResult<bool> {
        let mut map = self.locks.write().expect("lock store lock poisoned");
        Ok(map.remove(node).is_some())
    }

    fn len(&self) -> LockResult<usize> {
        Ok(self.locks.read().expect("lock store lock poisoned").len())
    }
}
