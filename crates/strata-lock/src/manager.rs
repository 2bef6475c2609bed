use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use strata_types::{NodeId, Timestamp};

use crate::error::{LockError, LockResult};
use crate::store::LockStore;
use crate::types::{Lock, LockScope, LockToken};

/// Default lock lifetime when the client requests none (WebDAV suggests
/// a finite default; infinite locks are never granted).
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Grants, refreshes, validates, and revokes node locks.
///
/// Expired locks are treated as released the moment they expire: every
/// read path checks `expires_at` against the supplied `now` and reaps the
/// stale record, so no background sweeper is required.
pub struct LockManager {
    store: Arc<dyn LockStore>,
}

impl LockManager {
    pub fn new(store: Arc<dyn LockStore>) -> Self {
        Self { store }
    }

    /// Acquire or refresh a lock on a node.
    ///
    /// - No live lock: a lock is created with the supplied token (or a
    ///   server-minted one) and TTL.
    /// - Live lock with the same token: the lock is refreshed in place.
    /// - Live lock with a different token: fails `Conflict`.
    pub fn lock(
        &self,
        node: NodeId,
        token: Option<LockToken>,
        ttl: Option<Duration>,
        owner: &str,
        scope: LockScope,
        now: Timestamp,
    ) -> LockResult<Lock> {
        let ttl = ttl.unwrap_or(DEFAULT_TTL);
        if let Some(existing) = self.live_lock(&node, now)? {
            match token {
                Some(ref t) if *t == existing.token => {
                    // Refresh in place, keeping the holder.
                    let refreshed = Lock::new(node, existing.token, owner, scope, ttl, now);
                    self.store.put(refreshed.clone())?;
                    debug!(node = %node.short(), "lock refreshed");
                    return Ok(refreshed);
                }
                _ => return Err(LockError::Locked { node }),
            }
        }
        let token = token.unwrap_or_else(LockToken::generate);
        let lock = Lock::new(node, token, owner, scope, ttl, now);
        self.store.put(lock.clone())?;
        debug!(node = %node.short(), expires = %lock.expires_at, "lock granted");
        Ok(lock)
    }

    /// Release a lock. The supplied token must match the current holder.
    pub fn unlock(&self, node: &NodeId, token: &LockToken, now: Timestamp) -> LockResult<()> {
        let existing = self
            .live_lock(node, now)?
            .ok_or(LockError::NotLocked(*node))?;
        if existing.token != *token {
            return Err(LockError::TokenMismatch {
                node: *node,
                supplied: token.clone(),
            });
        }
        self.store.remove(node)?;
        debug!(node = %node.short(), "lock released");
        Ok(())
    }

    /// Extend a lock's lifetime. The supplied token must match.
    pub fn refresh(
        &self,
        node: &NodeId,
        token: &LockToken,
        ttl: Option<Duration>,
        now: Timestamp,
    ) -> LockResult<Lock> {
        let existing = self
            .live_lock(node, now)?
            .ok_or(LockError::NotLocked(*node))?;
        if existing.token != *token {
            return Err(LockError::TokenMismatch {
                node: *node,
                supplied: token.clone(),
            });
        }
        let mut refreshed = existing;
        refreshed.expires_at = now.plus(ttl.unwrap_or(DEFAULT_TTL));
        self.store.put(refreshed.clone())?;
        Ok(refreshed)
    }

    /// Read the live lock on a node. Fails `NotFound` if the node is
    /// unlocked or the lock has expired.
    pub fn get_lock(&self, node: &NodeId, now: Timestamp) -> LockResult<Lock> {
        self.live_lock(node, now)?
            .ok_or(LockError::NotLocked(*node))
    }

    /// Returns `true` if a write bearing `token` (possibly none) may
    /// proceed on the node: either the node is unlocked or the token
    /// matches the holder.
    pub fn may_write(
        &self,
        node: &NodeId,
        token: Option<&LockToken>,
        now: Timestamp,
    ) -> LockResult<bool> {
        match self.live_lock(node, now)? {
            None => Ok(true),
            Some(lock) => Ok(token == Some(&lock.token)),
        }
    }

    /// Read the lock record, reaping it if expired.
    fn live_lock(&self, node: &NodeId, now: Timestamp) -> LockResult<Option<Lock>> {
        match self.store.get(node)? {
            Some(lock) if lock.is_expired(now) => {
                self.store.remove(node)?;
                Ok(None)
            }
            other => Ok(other),
        }
    }
}
