use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Job categories the core hands to external workers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Render a preview/thumbnail for new or changed content.
    Preview,
    /// Scan new content for malware.
    Scan,
    /// Convert content to another format.
    Convert,
    /// Update the search index.
    Index,
    /// Push a client notification.
    Notify,
}

/// Submission boundary to the external job infrastructure.
///
/// Fire-and-forget: the core never observes job completion, and a sink
/// must not block the calling mutation.
pub trait JobSink: Send + Sync {
    /// Hand a job to the external scheduler.
    fn submit(&self, kind: JobKind, payload: serde_json::Value);
}

/// A sink that drops every job. Default for embedded/test deployments.
#[derive(Debug, Default)]
pub struct NullJobSink;

impl JobSink for NullJobSink {
    fn submit(&self, kind: JobKind, _payload: serde_json::Value) {
        debug!(?kind, "job dropped (null sink)");
    }
}

/// A sink that records submissions for test assertions.
#[derive(Debug, Default)]
pub struct RecordingJobSink {
    submitted: RwLock<Vec<(JobKind, serde_json::Value)>>,
}

impl RecordingJobSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All submissions so far, in order.
    pub fn submitted(&self) -> Vec<(JobKind, serde_json::Value)> {
        self.submitted.read().expect("sink lock poisoned").clone()
    }

    /// Number of submissions of a given kind.
    pub fn count(&self, kind: JobKind) -> usize {
        self.submitted
            .read()
            .expect("sink lock poisoned")
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }
}

impl JobSink for RecordingJobSink {
    fn submit(&self, kind: JobKind, payload: serde_json::Value) {
        self.submitted
            .write()
            .expect("sink lock poisoned")
            .push((kind, payload));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingJobSink::new();
        sink.submit(JobKind::Scan, serde_json::json!({"node": "a"}));
        sink.submit(JobKind::Preview, serde_json::json!({"node": "b"}));
        let jobs = sink.submitted();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].0, JobKind::Scan);
        assert_eq!(sink.count(JobKind::Preview), 1);
        assert_eq!(sink.count(JobKind::Index), 0);
    }

    #[test]
    fn null_sink_accepts_everything() {
        NullJobSink.submit(JobKind::Notify, serde_json::Value::Null);
    }
}
