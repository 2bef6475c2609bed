//! Content-addressable, deduplicated blob storage for strata.
//!
//! Every file body in strata is stored as an immutable blob identified by
//! its BLAKE3 digest. Identical content is stored once; each file pointing
//! at the content holds a strong `(node, owner)` reference, and shared
//! copies hold secondary `(node, share)` references. A blob's bytes are
//! physically erased only when both reference sets drain to empty.
//!
//! # Components
//!
//! - [`BlobEntry`] — the per-digest index record carrying both reference sets
//! - [`BlobIndex`] — the index backend trait; reference mutation is atomic
//! - [`ByteSink`] — the physical byte storage trait (stream in/out + delete)
//! - [`BlobStore`] — the façade combining index and sink:
//!   store / retrieve / retrieve_range / release / share references
//!
//! # Design Rules
//!
//! 1. Blobs are immutable once written (content-addressing guarantees this).
//! 2. Write-then-link: persist the bytes, then register the reference.
//! 3. Reference mutation is a single atomic index operation, never a
//!    read-then-write pair. Concurrent stores of identical content never
//!    lose an increment; concurrent releases never erase twice.
//! 4. The sink never interprets content — it is a pure digest-keyed store.
//! 5. A dangling reference (entry without bytes, or bytes without entry)
//!    is surfaced as an error, never repaired silently.

pub mod entry;
pub mod error;
pub mod index;
pub mod sink;
pub mod store;

pub use entry::{BlobEntry, BlobRef, OwnerRef, ShareRef};
pub use error::{BlobError, BlobResult};
pub use index::{BlobIndex, InMemoryBlobIndex, RefOutcome, ReleaseOutcome};
pub use sink::{ByteSink, DirectoryByteSink, InMemoryByteSink};
pub use store::BlobStore;
