//! Connection state and sync statistics.

use parking_lot::RwLock;
use tracing::debug;

/// Where the engine currently stands with the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection: idle, between reconnect attempts, or stopped.
    #[default]
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// Live frames are being consumed.
    Streaming,
    /// A gap is being closed through the diff API.
    CatchingUp,
}

impl ConnectionState {
    /// Returns true if the engine holds a live push connection.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Streaming | ConnectionState::CatchingUp)
    }
}

/// Counters describing a session's sync activity.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Downstream applications (every consumer callback invocation).
    pub updates_applied: u64,
    /// Payloads that failed to parse against the known update schema.
    pub parse_failures: u64,
    /// Stale envelopes discarded (expected after reconnects and catch-up
    /// overlap).
    pub duplicates_discarded: u64,
    /// Gaps detected ahead of the live stream.
    pub gaps_detected: u64,
    /// Catch-up runs completed.
    pub catchups_completed: u64,
    /// Diff pages fetched.
    pub pages_fetched: u64,
    /// Push connections lost and re-established.
    pub reconnects: u64,
    /// Last error message, if any.
    pub last_error: Option<String>,
}

/// State shared between the run loop and the façade.
#[derive(Debug, Default)]
pub(crate) struct SharedState {
    state: RwLock<ConnectionState>,
    stats: RwLock<SyncStats>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn set_connection_state(&self, state: ConnectionState) {
        let mut current = self.state.write();
        if *current != state {
            debug!(from = ?*current, to = ?state, "connection state");
            *current = state;
        }
    }

    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    pub fn record<F: FnOnce(&mut SyncStats)>(&self, f: F) {
        f(&mut self.stats.write());
    }
}
