//! The server-side update log.

use crate::error::{ServerError, ServerResult};
use livelog_protocol::DiffPage;
use parking_lot::RwLock;
use serde_json::Value;

/// An append-only log of raw updates with monotonic sequence assignment.
///
/// Updates are stored as raw JSON so tests can seed payloads the client
/// schema does not know. Sequence numbers start at 1; `truncate_before`
/// raises the retention floor, after which older cursors can no longer be
/// served incrementally.
pub struct UpdateLog {
    inner: RwLock<LogInner>,
}

struct LogInner {
    /// Retained entries; `entries[i]` holds sequence `retained_from + i`.
    entries: Vec<Value>,
    /// Sequence number of the oldest retained entry.
    retained_from: u64,
}

impl UpdateLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(LogInner {
                entries: Vec::new(),
                retained_from: 1,
            }),
        }
    }

    /// Appends an update and returns its assigned sequence number.
    pub fn append(&self, update: Value) -> u64 {
        let mut inner = self.inner.write();
        inner.entries.push(update);
        inner.retained_from + inner.entries.len() as u64 - 1
    }

    /// Returns the highest assigned sequence number (0 when empty).
    pub fn latest_seq(&self) -> u64 {
        let inner = self.inner.read();
        inner.retained_from + inner.entries.len() as u64 - 1
    }

    /// Returns the oldest sequence the log still holds.
    pub fn retained_from(&self) -> u64 {
        self.inner.read().retained_from
    }

    /// Returns the page of up to `limit` updates after cursor `after`.
    pub fn page_after(&self, after: u64, limit: usize) -> ServerResult<DiffPage> {
        let inner = self.inner.read();
        if after + 1 < inner.retained_from {
            return Err(ServerError::UnknownCursor {
                requested: after,
                retained_from: inner.retained_from,
            });
        }

        let start = (after + 1 - inner.retained_from) as usize;
        let page: Vec<Value> = inner
            .entries
            .iter()
            .skip(start)
            .take(limit)
            .cloned()
            .collect();
        let next_seq = after + page.len() as u64;
        let latest = inner.retained_from + inner.entries.len() as u64 - 1;
        Ok(DiffPage::new(next_seq, next_seq < latest, page))
    }

    /// Drops entries with sequence below `seq` and raises the retention
    /// floor accordingly.
    pub fn truncate_before(&self, seq: u64) {
        let mut inner = self.inner.write();
        if seq <= inner.retained_from {
            return;
        }
        let latest = inner.retained_from + inner.entries.len() as u64;
        let cut = seq.min(latest);
        let drop_count = (cut - inner.retained_from) as usize;
        inner.entries.drain(..drop_count);
        inner.retained_from = cut;
    }

    /// Returns the number of retained entries.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Returns true if no entries are retained.
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }
}

impl Default for UpdateLog {
    fn default() -> Self {
        Self::new()
    }
}
