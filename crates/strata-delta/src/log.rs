use std::collections::VecDeque;
use std::sync::RwLock;

use strata_types::NodeId;

use crate::error::DeltaResult;
use crate::record::DeltaRecord;

/// Append-only storage for delta records.
///
/// Positions start at 1 and are assigned by the log itself under a single
/// writer section, relying on nothing but insertion order — the feed has
/// one logical writer per operation, so no compare-and-swap is needed.
pub trait DeltaLog: Send + Sync {
    /// Commit a record, assigning the next position. Returns the position.
    fn append(&self, record: DeltaRecord) -> DeltaResult<u64>;

    /// Position of the most recently committed record; 0 if none.
    fn head(&self) -> DeltaResult<u64>;

    /// Position of the oldest record still retained; `None` if the log is
    /// empty.
    fn first_retained(&self) -> DeltaResult<Option<u64>>;

    /// Records with positions strictly greater than `after`, in position
    /// order, at most `limit`.
    fn read_after(&self, after: u64, limit: usize) -> DeltaResult<Vec<DeltaRecord>>;

    /// The most recent record for one node — a filtered view over the same
    /// log, not separate storage.
    fn last_for_node(&self, node: &NodeId) -> DeltaResult<Option<DeltaRecord>>;
}

/// Capped in-memory delta log (the capped-collection analog).
///
/// Keeps at most `cap` records; the oldest fall off the front. Positions
/// keep increasing regardless, so a cursor pointing below the retained
/// window is detectably stale.
pub struct InMemoryDeltaLog {
    cap: usize,
    inner: RwLock<LogState>,
}

#[derive(Default)]
struct LogState {
    records: VecDeque<DeltaRecord>,
    next_position: u64,
}

impl InMemoryDeltaLog {
    /// Default retention cap.
    pub const DEFAULT_CAP: usize = 100_000;

    /// Create a log with the default retention cap.
    pub fn new() -> Self {
        Self::with_cap(Self::DEFAULT_CAP)
    }

    /// Create a log retaining at most `cap` records.
    pub fn with_cap(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            inner: RwLock::new(LogState {
                records: VecDeque::new(),
                next_position: 1,
            }),
        }
    }

    /// Number of records currently retained.
    pub fn len(&self) -> usize {
        self.inner.read().expect("delta log lock poisoned").records.len()
    }

    /// Returns `true` if no records are retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryDeltaLog {
    fn default() -> Self {
        Self::new()
    }
}

impl DeltaLog for InMemoryDeltaLog {
    fn append(&self, mut record: DeltaRecord) -> DeltaResult<u64> {
        let mut state = self.inner.write().expect("delta log lock poisoned");
        let position = state.next_position;
        state.next_position += 1;
        record.position = position;
        state.records.push_back(record);
        while state.records.len() > self.cap {
            state.records.pop_front();
        }
        Ok(position)
    }

    fn head(&self) -> DeltaResult<u64> {
        let state = self.inner.read().expect("delta log lock poisoned");
        Ok(state.next_position - 1)
    }

    fn first_retained(&self) -> DeltaResult<Option<u64>> {
        let state = self.inner.read().expect("delta log lock poisoned");
        Ok(state.records.front().map(|r| r.position))
    }

    fn read_after(&self, after: u64, limit: usize) -> DeltaResult<Vec<DeltaRecord>> {
        let state = self.inner.read().expect("delta log lock poisoned");
        Ok(state
            .records
            .iter()
            .filter(|r| r.position > after)
            .take(limit)
            .cloned()
            .collect())
    }

    fn last_for_node(&self, node: &NodeId) -> DeltaResult<Option<DeltaRecord>> {
        let state = self.inner.read().expect("delta log lock poisoned");
        Ok(state
            .records
            .iter()
            .rev()
            .find(|r| r.node == *node)
            .cloned())
    }
}
