use std::sync::Arc;

use tracing::debug;

use strata_types::{NodeId, Timestamp};

use crate::cursor::Cursor;
use crate::error::DeltaResult;
use crate::log::DeltaLog;
use crate::record::DeltaRecord;

/// One page of change feed results.
#[derive(Clone, Debug)]
pub struct DeltaPage {
    /// Records strictly after the request cursor, in commit order.
    pub records: Vec<DeltaRecord>,
    /// Cursor to resume from. Always valid to hand back to `get_delta`.
    pub next_cursor: Cursor,
    /// More records were committed than fit in `limit`.
    pub has_more: bool,
    /// The request cursor fell outside retention; the client must perform
    /// a full resync before resuming from `next_cursor`.
    pub reset: bool,
}

/// The change feed consumed by sync clients.
pub struct ChangeFeed {
    log: Arc<dyn DeltaLog>,
}

impl ChangeFeed {
    pub fn new(log: Arc<dyn DeltaLog>) -> Self {
        Self { log }
    }

    /// Commit a record and return a cursor positioned on it.
    pub fn append(&self, record: DeltaRecord) -> DeltaResult<Cursor> {
        let ts = record.timestamp;
        let position = self.log.append(record)?;
        debug!(position, "delta appended");
        Ok(Cursor::at(position, ts))
    }

    /// A cursor representing "now": `get_delta` on it returns no records
    /// until a further mutation commits. Clients bootstrap from this.
    pub fn last_cursor(&self, now: Timestamp) -> DeltaResult<Cursor> {
        Ok(Cursor::at(self.log.head()?, now))
    }

    /// Records strictly after `cursor`, at most `limit`, in commit order.
    ///
    /// When the cursor's position is no longer resolvable — older than the
    /// retained window, or past the head — the page carries `reset = true`,
    /// an empty record set, and `next_cursor` at the current head. The
    /// client performs a full listing and resumes from there.
    pub fn get_delta(&self, cursor: &Cursor, limit: usize, now: Timestamp) -> DeltaResult<DeltaPage> {
        let head = self.log.head()?;
        if cursor.position > head {
            return Ok(self.reset_page(head, now));
        }
        if let Some(first) = self.log.first_retained()? {
            // Records in (cursor, first) have been dropped by retention.
            if cursor.position + 1 < first && cursor.position < head {
                return Ok(self.reset_page(head, now));
            }
        } else if cursor.position < head {
            // Log drained entirely while mutations kept counting.
            return Ok(self.reset_page(head, now));
        }

        let limit = limit.max(1);
        let mut records = self.log.read_after(cursor.position, limit + 1)?;
        let has_more = records.len() > limit;
        records.truncate(limit);
        let next_position = records.last().map_or(cursor.position, |r| r.position);
        Ok(DeltaPage {
            records,
            next_cursor: Cursor::at(next_position, now),
            has_more,
            reset: false,
        })
    }

    /// The most recent feed record for a node, if still retained.
    pub fn last_record_for_node(&self, node: &NodeId) -> DeltaResult<Option<DeltaRecord>> {
        self.log.last_for_node(node)
    }

    fn reset_page(&self, head: u64, now: Timestamp) -> DeltaPage {
        DeltaPage {
            records: Vec::new(),
            next_cursor: Cursor::at(head, now),
            has_more: false,
            reset: true,
        }
    }
}
