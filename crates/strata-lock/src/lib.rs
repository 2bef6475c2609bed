//! WebDAV-style lock management for strata nodes.
//!
//! The lock manager is the only mechanism that serializes conflicting
//! writers at the application level (e.g. PUT-after-LOCK). A lock binds a
//! node to an opaque token with an expiry; expiry is checked lazily at read
//! time, so no background sweeper thread is needed.
//!
//! State machine per node:
//!
//! ```text
//! unlocked -> locked(token, owner, expiry)   lock()
//! locked   -> locked                          refresh() (same token)
//! locked   -> unlocked                        unlock() / TTL elapsed
//! ```
//!
//! A lock request against a live lock with a different token fails
//! `Conflict`; an unlock with the wrong token fails `Conflict`; reading a
//! lock on an unlocked node fails `NotFound`.

pub mod error;
pub mod manager;
pub mod store;
pub mod types;

pub use error::{LockError, LockResult};
pub use manager::{LockManager, DEFAULT_TTL};
pub use store::{InMemoryLockStore, LockStore};
pub use types::{Lock, LockScope, LockToken};
