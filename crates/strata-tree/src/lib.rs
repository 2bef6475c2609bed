//! The strata filesystem engine.
//!
//! Ties every subsystem together behind one operation surface: the node
//! tree (collections and files), deduplicated content via
//! [`strata_blob`], share-based access control via [`strata_acl`],
//! WebDAV-style locks via [`strata_lock`], per-user quota via
//! [`strata_quota`], the resumable change feed via [`strata_delta`],
//! and the event/job fabric via [`strata_events`].
//!
//! # Components
//!
//! - [`Node`] / [`NodeKind`] — the tree records: collections, and files
//!   pointing at content by digest with a monotonically increasing version
//! - [`NodeStore`] — persistence boundary for node records
//! - [`Filesystem`] — the engine; every operation takes a [`Caller`]
//!   carrying the authenticated principal and an optional lock token
//! - [`FsConfig`] — deployment policy: name case sensitivity, trash
//!   retention, default lock lifetime
//! - [`NamespaceRegistry`] — registered app-attribute namespaces
//!
//! # Semantics in brief
//!
//! Deletion is soft by default: subtrees move to the owner's trash,
//! quota is refunded, and content stays restorable until the retention
//! window lapses or a force delete erases it. Concurrent content writes
//! are fenced by per-file versions (lost updates fail `Conflict`) and
//! optionally by exclusive locks. Every mutation lands on the change
//! feed exactly once and is broadcast to event subscribers.

pub mod attrs;
pub mod config;
pub mod error;
pub mod fs;
pub mod names;
pub mod node;
pub mod store;

pub use attrs::NamespaceRegistry;
pub use config::FsConfig;
pub use error::{FsError, FsResult};
pub use fs::{AttributeMap, Caller, ConflictPolicy, Filesystem, TypeFilter};
pub use names::{deconflicted_name, validate_node_name, MAX_NAME_LEN};
pub use node::{FileState, Node, NodeKind};
pub use store::{InMemoryNodeStore, NodeStore};
