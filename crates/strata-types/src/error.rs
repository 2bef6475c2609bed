use serde::{Deserialize, Serialize};

/// Errors from parsing or validating foundation types.
#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    /// A node identifier string could not be parsed.
    #[error("invalid node id: {0}")]
    InvalidId(String),

    /// A hex string could not be decoded.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// A byte buffer had the wrong length.
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// An unknown deleted-policy wire flag.
    #[error("invalid deleted flag: {0} (expected 0, 1, or 2)")]
    InvalidDeletedFlag(u8),
}

/// The stable error taxonomy shared by every strata component.
///
/// Each operation failure classifies into exactly one kind, and each kind
/// maps to a fixed HTTP-equivalent status class at the API boundary, so
/// client SDKs can branch on kind rather than message text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed input: bad id, illegal filename character, invalid option.
    InvalidArgument,
    /// The target node/blob/lock/cursor does not exist or is not visible
    /// under the current deleted-policy filter.
    NotFound,
    /// ACL denial. Carries a sub-reason code at the error site.
    Forbidden,
    /// Name collision, illegal move, version mismatch, quota exceeded,
    /// lock held by another token, or share-nesting violation.
    Conflict,
    /// Malformed byte-range request on partial content retrieval.
    InvalidRange,
    /// Transient failure in the backing store. The caller may retry; the
    /// core never retries on its own.
    Unavailable,
}

impl ErrorKind {
    /// The HTTP-equivalent status for this kind.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidArgument => 400,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::InvalidRange => 416,
            Self::Unavailable => 503,
        }
    }

    /// Stable machine-readable code name.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::Conflict => "conflict",
            Self::InvalidRange => "invalid_range",
            Self::Unavailable => "unavailable",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}
