//! Foundation types for the strata storage engine.
//!
//! This crate provides the identifier, digest, temporal, and error-taxonomy
//! types used throughout strata. Every other strata crate depends on
//! `strata-types`.
//!
//! # Key Types
//!
//! - [`NodeId`] — opaque node identifier (UUID v7, time-ordered)
//! - [`UserId`] / [`GroupId`] / [`ShareId`] — principal and share identifiers
//! - [`ContentHash`] — content digest (BLAKE3) used as the dedup key
//! - [`Timestamp`] — millisecond wall-clock timestamp
//! - [`DeletedPolicy`] — the three-state visibility filter for soft-deleted
//!   nodes used by every lookup operation
//! - [`ErrorKind`] — the stable error taxonomy with its HTTP-status mapping

pub mod error;
pub mod hash;
pub mod ids;
pub mod policy;
pub mod time;

pub use error::{ErrorKind, TypeError};
pub use hash::ContentHash;
pub use ids::{GroupId, NodeId, ShareId, UserId};
pub use policy::DeletedPolicy;
pub use time::Timestamp;
