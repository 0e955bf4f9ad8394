//! The engine's single source of truth for applied log position.

use crate::error::{SyncError, SyncResult};
use std::sync::atomic::{AtomicU64, Ordering};

/// Highest sequence number fully applied downstream.
///
/// Monotonic for the lifetime of one authenticated session. Every
/// "applied up to N" fact funnels through [`SequenceCursor::advance_to`];
/// no other component mutates the position. Reads are atomic so the façade
/// can report the position from other tasks.
#[derive(Debug)]
pub struct SequenceCursor {
    position: AtomicU64,
}

impl SequenceCursor {
    /// Creates a cursor at the given baseline (0 for a fresh session).
    pub fn new(baseline: u64) -> Self {
        Self {
            position: AtomicU64::new(baseline),
        }
    }

    /// Returns the current position.
    pub fn current(&self) -> u64 {
        self.position.load(Ordering::SeqCst)
    }

    /// Advances the cursor to `seq`.
    ///
    /// Moving backward is a logic error, not a recoverable condition: it
    /// asserts in debug builds and fails with [`SyncError::Regression`] in
    /// release builds, where callers log and drop the request. Advancing to
    /// the current position is an idempotent no-op.
    pub fn advance_to(&self, seq: u64) -> SyncResult<()> {
        let current = self.current();
        if seq < current {
            debug_assert!(
                seq >= current,
                "cursor regression: at {current}, asked to move back to {seq}"
            );
            return Err(SyncError::Regression {
                current,
                requested: seq,
            });
        }
        self.position.store(seq, Ordering::SeqCst);
        Ok(())
    }
}
