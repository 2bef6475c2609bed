//! Append-only change feed for strata sync clients.
//!
//! Every node mutation appends one [`DeltaRecord`] to the feed. Sync
//! clients (desktop/mobile/WebDAV) poll with a [`Cursor`] and receive the
//! records committed strictly after it, in commit order, with pagination
//! (`has_more`) and a `reset` signal when the cursor can no longer be
//! resolved (retention expired) and a full resync is required.
//!
//! # Cursor encoding
//!
//! The cursor wire format is the legacy five-field delimited string
//! `kind|flag|flag|sequence|timestamp`. The two flags are reserved and
//! must round-trip exactly for cross-version compatibility; the structure
//! is parsed into an explicit [`Cursor`] struct, never split ad hoc.
//!
//! # Ordering
//!
//! Positions are assigned by the log under a single writer lock, so records
//! for one node are always observed in the order their operations
//! committed. Records are never mutated or deleted; bounded retention is
//! enforced by capping the log (oldest records fall off).

pub mod cursor;
pub mod error;
pub mod feed;
pub mod log;
pub mod record;

pub use cursor::{Cursor, CursorKind};
pub use error::{DeltaError, DeltaResult};
pub use feed::{ChangeFeed, DeltaPage};
pub use log::{DeltaLog, InMemoryDeltaLog};
pub use record::{DeltaRecord, Operation};
