use strata_types::{ErrorKind, UserId};

/// Errors from quota operations.
#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    /// Accepting the new content would push the user past the hard quota.
    #[error("quota exceeded for {user}: {used} + {requested} > {hard} bytes")]
    Exceeded {
        user: UserId,
        used: u64,
        requested: u64,
        hard: u64,
    },
}

impl QuotaError {
    /// Classify into the shared error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Conflict
    }
}

/// Result alias for quota operations.
pub type QuotaResult<T> = Result<T, QuotaError>;
