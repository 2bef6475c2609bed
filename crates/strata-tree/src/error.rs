use strata_acl::AccessError;
use strata_blob::BlobError;
use strata_delta::DeltaError;
use strata_lock::LockError;
use strata_quota::QuotaError;
use strata_types::{ErrorKind, NodeId, TypeError};

/// Errors from node tree operations.
///
/// Component errors are aggregated here so every engine operation returns
/// one error type; [`kind`](FsError::kind) classifies into the shared
/// taxonomy for the API boundary.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// A node name failed validation.
    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// Malformed input other than a name.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The app-attribute namespace was never registered.
    #[error("unknown app attribute namespace {0:?}")]
    UnknownNamespace(String),

    /// The node does not exist or is not visible under the current
    /// deleted-policy filter.
    #[error("node not found: {0}")]
    NotFound(NodeId),

    /// A path could not be resolved.
    #[error("path not found: {0:?}")]
    PathNotFound(String),

    /// A live sibling with the same name already exists.
    #[error("a node named {name:?} already exists in the target collection")]
    NameExists { name: String },

    /// The target collection is the node itself or one of its descendants.
    #[error("node {0} cannot become a child of itself")]
    CantBeChildOfItself(NodeId),

    /// Moving a shared node beneath another share root.
    #[error("shared node {0} cannot be placed under another share")]
    SharedNodeCantBeChildOfShare(NodeId),

    /// Creating a share root inside (or above) an existing share.
    #[error("node {0} overlaps an existing share root")]
    NestedShare(NodeId),

    /// Optimistic concurrency failure on a file write.
    #[error("version mismatch on {node}: expected {expected}, found {actual}")]
    VersionMismatch {
        node: NodeId,
        expected: u64,
        actual: u64,
    },

    /// The operation needs a collection.
    #[error("node {0} is not a collection")]
    NotACollection(NodeId),

    /// The operation needs a file.
    #[error("node {0} is not a file")]
    NotAFile(NodeId),

    /// ACL denial.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Lock conflict or missing lock.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Blob storage failure.
    #[error(transparent)]
    Blob(#[from] BlobError),

    /// Quota breach.
    #[error(transparent)]
    Quota(#[from] QuotaError),

    /// Change feed failure.
    #[error(transparent)]
    Delta(#[from] DeltaError),

    /// Foundation type parse failure.
    #[error(transparent)]
    Type(#[from] TypeError),
}

impl FsError {
    /// Classify into the shared error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidName { .. }
            | Self::InvalidArgument(_)
            | Self::UnknownNamespace(_)
            | Self::Type(_) => ErrorKind::InvalidArgument,
            Self::NotFound(_) | Self::PathNotFound(_) => ErrorKind::NotFound,
            Self::NameExists { .. }
            | Self::CantBeChildOfItself(_)
            | Self::SharedNodeCantBeChildOfShare(_)
            | Self::NestedShare(_)
            | Self::VersionMismatch { .. }
            | Self::NotACollection(_)
            | Self::NotAFile(_) => ErrorKind::Conflict,
            Self::Access(e) => e.kind(),
            Self::Lock(e) => e.kind(),
            Self::Blob(e) => e.kind(),
            Self::Quota(e) => e.kind(),
            Self::Delta(e) => e.kind(),
        }
    }

    /// HTTP-equivalent status for the API boundary.
    pub fn http_status(&self) -> u16 {
        self.kind().http_status()
    }
}

/// Result alias for tree operations.
pub type FsResult<T> = Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_taxonomy() {
        let id = NodeId::generate();
        assert_eq!(
            FsError::InvalidName {
                name: "a/b".into(),
                reason: "slash".into()
            }
            .kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(FsError::NotFound(id).kind(), ErrorKind::NotFound);
        assert_eq!(
            FsError::NameExists { name: "a".into() }.kind(),
            ErrorKind::Conflict
        );
        assert_eq!(FsError::CantBeChildOfItself(id).http_status(), 409);
        assert_eq!(FsError::NotFound(id).http_status(), 404);
    }

    #[test]
    fn component_errors_carry_their_kind() {
        let err: FsError = QuotaError::Exceeded {
            user: strata_types::UserId::from("u"),
            used: 1,
            requested: 2,
            hard: 2,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err: FsError = LockError::NotLocked(NodeId::generate()).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
