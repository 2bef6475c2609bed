use std::collections::HashMap;
use std::sync::RwLock;

use strata_types::UserId;

use crate::error::QuotaResult;
use crate::tracker::QuotaState;

/// Storage backend for per-user quota state.
///
/// `update` runs the closure inside one atomic section so concurrent
/// charges and releases never lose an update.
pub trait QuotaStore: Send + Sync {
    /// Read a user's quota state (default limits when never written).
    fn get(&self, user: &UserId) -> QuotaResult<QuotaState>;

    /// Replace a user's configured limits, preserving usage.
    fn set_limits(&self, user: &UserId, soft: Option<u64>, hard: Option<u64>) -> QuotaResult<()>;

    /// Atomically read-modify-write a user's state, returning the updated
    /// copy.
    fn update(
        &self,
        user: &UserId,
        f: &mut dyn FnMut(&mut QuotaState),
    ) -> QuotaResult<QuotaState>;
}

/// In-memory quota store.
pub struct InMemoryQuotaStore {
    states: RwLock<HashMap<UserId, QuotaState>>,
}

impl InMemoryQuotaStore {
    pub fn new() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryQuotaStore {
    fn default() -> Self {
        Self::new()
    }
}

impl QuotaStore for InMemoryQuotaStore {
    fn get(&self, user: &UserId) -> QuotaResult<QuotaState> {
        let map = self.states.read().expect("quota store lock poisoned");
        Ok(map.get(user).cloned().unwrap_or_default())
    }

    fn set_limits(&self, user: &UserId, soft: Option<u64>, hard: Option<u64>) -> QuotaResult<()> {
        let mut map = self.states.write().expect("quota store lock poisoned");
        let state = map.entry(user.clone()).or_default();
        state.soft_quota = soft;
        state.hard_quota = hard;
        Ok(())
    }

    fn update(
        &self,
        user: &UserId,
        f: &mut dyn FnMut(&mut QuotaState),
    ) -> QuotaResult<QuotaState> {
        let mut map = self.states.write().expect("quota store lock poisoned");
        let state = map.entry(user.clone()).or_default();
        f(state);
        Ok(state.clone())
    }
}
