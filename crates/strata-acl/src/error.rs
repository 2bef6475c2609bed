use serde::{Deserialize, Serialize};
use strata_types::ErrorKind;

/// Stable numeric sub-codes carried by `Forbidden` errors.
///
/// The discriminants are part of the client contract and must never be
/// renumbered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum DenyCode {
    /// The operation requires an administrative principal.
    AdminRequired = 10,
    /// The principal may not read the node.
    NotAllowedToAccess = 11,
    /// The principal may not modify the node.
    NotAllowedToModify = 12,
    /// The principal may not change the node's share rules.
    NotAllowedToShare = 13,
}

impl DenyCode {
    /// The numeric wire code.
    pub fn code(&self) -> u16 {
        *self as u16
    }
}

/// Errors from access-control evaluation.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    /// The principal is not permitted to perform the operation.
    #[error("forbidden ({}): {reason}", code.code())]
    Forbidden { code: DenyCode, reason: String },
}

impl AccessError {
    pub fn forbidden(code: DenyCode, reason: impl Into<String>) -> Self {
        Self::Forbidden {
            code,
            reason: reason.into(),
        }
    }

    /// Classify into the shared error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Forbidden
    }

    /// The stable numeric sub-code.
    pub fn deny_code(&self) -> DenyCode {
        match self {
            Self::Forbidden { code, .. } => *code,
        }
    }
}

/// Result alias for access-control operations.
pub type AccessResult<T> = Result<T, AccessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deny_codes_are_stable() {
        assert_eq!(DenyCode::AdminRequired.code(), 10);
        assert_eq!(DenyCode::NotAllowedToAccess.code(), 11);
        assert_eq!(DenyCode::NotAllowedToModify.code(), 12);
        assert_eq!(DenyCode::NotAllowedToShare.code(), 13);
    }

    #[test]
    fn forbidden_formats_code() {
        let err = AccessError::forbidden(DenyCode::NotAllowedToModify, "no write rule");
        assert!(err.to_string().contains("(12)"));
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }
}
