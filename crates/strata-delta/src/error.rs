use strata_types::ErrorKind;

/// Errors from change feed operations.
#[derive(Debug, thiserror::Error)]
pub enum DeltaError {
    /// A cursor string could not be parsed.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// A record snapshot could not be serialized.
    #[error("snapshot serialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl DeltaError {
    /// Classify into the shared error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCursor(_) => ErrorKind::InvalidArgument,
            Self::Snapshot(_) => ErrorKind::Unavailable,
        }
    }
}

/// Result alias for change feed operations.
pub type DeltaResult<T> = Result<T, DeltaError>;
