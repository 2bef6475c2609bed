use std::time::Duration;

/// Deployment policy for the filesystem engine.
#[derive(Clone, Debug)]
pub struct FsConfig {
    /// Sibling-name uniqueness ignores case. Stored names keep the case
    /// the client supplied either way.
    pub case_insensitive_names: bool,
    /// How long soft-deleted nodes stay restorable before
    /// `purge_expired` may erase them.
    pub trash_retention: Duration,
    /// Lock lifetime granted when a client requests none.
    pub default_lock_ttl: Duration,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            case_insensitive_names: false,
            trash_retention: Duration::from_secs(30 * 24 * 60 * 60),
            default_lock_ttl: strata_lock::DEFAULT_TTL,
        }
    }
}
