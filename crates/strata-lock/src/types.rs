use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strata_types::{NodeId, Timestamp};
use uuid::Uuid;

/// Opaque lock token. Either supplied by the client (WebDAV `If:` header
/// flows) or minted by the server.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockToken(String);

impl LockToken {
    /// Wrap a client-supplied token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Mint a server-generated token (opaque UUID URN).
    pub fn generate() -> Self {
        Self(format!("opaquelocktoken:{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LockToken({})", self.0)
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LockToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lock scope, mirroring WebDAV exclusive/shared semantics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockScope {
    #[default]
    Exclusive,
    Shared,
}

/// A live lock on a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    /// The locked node.
    pub node: NodeId,
    /// Opaque token identifying the holder.
    pub token: LockToken,
    /// Free-form owner label supplied by the client (WebDAV `owner` body).
    pub owner: String,
    /// Scope of the lock.
    pub scope: LockScope,
    /// Expiry instant. Past this, the lock is treated as released.
    pub expires_at: Timestamp,
}

impl Lock {
    pub fn new(
        node: NodeId,
        token: LockToken,
        owner: impl Into<String>,
        scope: LockScope,
        ttl: Duration,
        now: Timestamp,
    ) -> Self {
        Self {
            node,
            token,
            owner: owner.into(),
            scope,
            expires_at: now.plus(ttl),
        }
    }

    /// Returns `true` if the lock has passed its expiry.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }

    /// Remaining lifetime at `now`, zero if expired.
    pub fn remaining(&self, now: Timestamp) -> Duration {
        let ms = self.expires_at.as_millis().saturating_sub(now.as_millis());
        Duration::from_millis(ms.max(0) as u64)
    }
}
