use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strata_types::UserId;

use crate::error::{QuotaError, QuotaResult};
use crate::store::QuotaStore;

/// Per-user quota state: configured limits plus the cached usage aggregate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaState {
    /// Advisory limit; breaches are surfaced, not enforced.
    pub soft_quota: Option<u64>,
    /// Enforced limit; `None` means unlimited.
    pub hard_quota: Option<u64>,
    /// Sum of `size` over the user's live files (logical, not physical).
    pub used_bytes: u64,
}

/// Usage summary for UI/API consumption.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaReport {
    pub used: u64,
    pub soft: Option<u64>,
    pub hard: Option<u64>,
    /// The advisory soft limit is currently breached.
    pub soft_exceeded: bool,
}

/// Tracks per-user logical storage consumption.
pub struct QuotaTracker {
    store: Arc<dyn QuotaStore>,
}

impl QuotaTracker {
    pub fn new(store: Arc<dyn QuotaStore>) -> Self {
        Self { store }
    }

    /// Current logical usage in bytes.
    pub fn usage(&self, user: &UserId) -> QuotaResult<u64> {
        Ok(self.store.get(user)?.used_bytes)
    }

    /// Full usage report, including advisory soft-limit state.
    pub fn report(&self, user: &UserId) -> QuotaResult<QuotaReport> {
        let state = self.store.get(user)?;
        Ok(QuotaReport {
            used: state.used_bytes,
            soft: state.soft_quota,
            hard: state.hard_quota,
            soft_exceeded: state
                .soft_quota
                .is_some_and(|soft| state.used_bytes > soft),
        })
    }

    /// Fail `Conflict` if accepting `additional` bytes would push the user
    /// past the hard quota. The soft quota never blocks.
    pub fn assert_within_quota(&self, user: &UserId, additional: u64) -> QuotaResult<()> {
        let state = self.store.get(user)?;
        if let Some(hard) = state.hard_quota {
            if state.used_bytes.saturating_add(additional) > hard {
                return Err(QuotaError::Exceeded {
                    user: user.clone(),
                    used: state.used_bytes,
                    requested: additional,
                    hard,
                });
            }
        }
        Ok(())
    }

    /// Charge a user for a new live file.
    pub fn charge(&self, user: &UserId, bytes: u64) -> QuotaResult<()> {
        self.store
            .update(user, &mut |s| s.used_bytes = s.used_bytes.saturating_add(bytes))?;
        Ok(())
    }

    /// Release a charge (file deleted or soft-deleted). Saturating: usage
    /// never goes negative even if accounting drifted.
    pub fn release(&self, user: &UserId, bytes: u64) -> QuotaResult<()> {
        self.store
            .update(user, &mut |s| s.used_bytes = s.used_bytes.saturating_sub(bytes))?;
        Ok(())
    }

    /// Configure a user's limits.
    pub fn set_limits(&self, user: &UserId, soft: Option<u64>, hard: Option<u64>) -> QuotaResult<()> {
        self.store.set_limits(user, soft, hard)
    }
}
