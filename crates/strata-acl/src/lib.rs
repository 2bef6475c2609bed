//! Access-control evaluation for strata nodes.
//!
//! A node carries an ordered list of [`AclRule`]s; a node with a non-empty
//! rule set is a *share root* and its subtree inherits those rules unless a
//! descendant is itself a share root. Evaluation order is fixed:
//!
//! 1. Ownership — the owner (and an admin principal) always has full rights.
//! 2. Explicit per-node rules — `user` rules are matched before `group`
//!    rules; the first matching rule wins.
//! 3. Inherited rules from the nearest share-root ancestor, same order.
//!
//! Absence of any matching rule denies by default. Denials carry a stable
//! numeric [`DenyCode`] so clients can branch on code, not message text.
//!
//! The evaluator is tree-agnostic: the caller resolves the owning node's
//! rule set and the nearest share-root ancestor's rule set and passes both
//! in. This keeps the crate a leaf with no dependency on node storage.

pub mod error;
pub mod evaluator;
pub mod principal;
pub mod rule;

pub use error::{AccessError, AccessResult, DenyCode};
pub use evaluator::{AccessControl, AclContext};
pub use principal::Principal;
pub use rule::{AclRule, AclSet, Privilege, RuleSubject};
