//! Per-user storage accounting for strata.
//!
//! Quota is charged per *logical* file: a user storing two identical files
//! is charged twice even though deduplication keeps one physical blob.
//! Usage counts live files only — soft delete releases the charge, restore
//! re-applies it.
//!
//! The hard quota is enforced (`Conflict` on breach); the soft quota is
//! advisory and only surfaced through [`QuotaReport`] for UI consumption.

pub mod error;
pub mod store;
pub mod tracker;

pub use error::{QuotaError, QuotaResult};
pub use store::{InMemoryQuotaStore, QuotaStore};
pub use tracker::{QuotaReport, QuotaState, QuotaTracker};
