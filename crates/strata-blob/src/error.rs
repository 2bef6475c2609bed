use strata_types::{ContentHash, ErrorKind};

/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// No blob exists for the given digest.
    #[error("blob not found: {0}")]
    NotFound(ContentHash),

    /// The index references a digest the byte sink does not hold.
    /// Must never occur if reference counting is correct.
    #[error("dangling blob reference: {0}")]
    DanglingReference(ContentHash),

    /// A byte-range request falls outside the blob or is malformed.
    #[error("invalid range {start}..{end} for blob of {size} bytes")]
    InvalidRange { start: u64, end: u64, size: u64 },

    /// The stored byte length does not match the index entry.
    #[error("corrupt blob {hash}: expected {expected} bytes, sink holds {actual}")]
    SizeMismatch {
        hash: ContentHash,
        expected: u64,
        actual: u64,
    },

    /// I/O failure in the byte sink or while draining a content stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BlobError {
    /// Classify into the shared error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::DanglingReference(_) => ErrorKind::NotFound,
            Self::InvalidRange { .. } => ErrorKind::InvalidRange,
            Self::SizeMismatch { .. } => ErrorKind::Conflict,
            Self::Io(_) => ErrorKind::Unavailable,
        }
    }
}

/// Result alias for blob operations.
pub type BlobResult<T> = Result<T, BlobError>;
