use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Visibility filter for soft-deleted nodes.
///
/// Every lookup operation takes a `DeletedPolicy`, mirroring the
/// three-state filter exposed throughout the API: `0` excludes deleted
/// nodes, `1` shows only deleted nodes, `2` includes everything.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeletedPolicy {
    /// Only live nodes are visible (the default).
    #[default]
    Exclude,
    /// Only soft-deleted nodes are visible (trash views).
    Only,
    /// Both live and soft-deleted nodes are visible.
    Include,
}

impl DeletedPolicy {
    /// Decode the wire representation (`0`/`1`/`2`).
    pub fn from_flag(flag: u8) -> Result<Self, TypeError> {
        match flag {
            0 => Ok(Self::Exclude),
            1 => Ok(Self::Only),
            2 => Ok(Self::Include),
            other => Err(TypeError::InvalidDeletedFlag(other)),
        }
    }

    /// The wire representation.
    pub fn as_flag(&self) -> u8 {
        match self {
            Self::Exclude => 0,
            Self::Only => 1,
            Self::Include => 2,
        }
    }

    /// Returns `true` if a node with the given deleted state passes the
    /// filter.
    pub fn admits(&self, deleted: bool) -> bool {
        match self {
            Self::Exclude => !deleted,
            Self::Only => deleted,
            Self::Include => true,
        }
    }
}
