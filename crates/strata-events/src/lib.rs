//! Typed mutation events and the job-submission boundary for strata.
//!
//! External collaborators (preview generation, virus scanning, conversion,
//! search indexing) used to be discovered through dynamic hook lookup.
//! Here that is replaced by two explicit seams:
//!
//! - [`EventBus`] — a closed [`FsEventKind`] enum with strongly typed
//!   payloads, fanned out to filtered subscribers over broadcast channels.
//!   In-process consumers register a typed subscription instead of being
//!   resolved by method name.
//! - [`JobSink`] — the fire-and-forget `submit(kind, payload)` contract for
//!   out-of-process workers. The core never waits on job completion.

pub mod bus;
pub mod event;
pub mod jobs;

pub use bus::{BusConfig, EventBus, EventFilter, EventStream};
pub use event::{EventDetail, FsEvent, FsEventKind};
pub use jobs::{JobKind, JobSink, NullJobSink, RecordingJobSink};
