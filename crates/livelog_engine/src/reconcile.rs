//! Ordering and exactly-once application across both delivery paths.
//!
//! The reconciler is the only component that applies envelopes downstream,
//! and it runs on a single task: that task boundary is the serialization
//! the ordering guarantee rests on. Live frames and catch-up pages both
//! funnel through here; whichever path reaches a sequence number first
//! wins, and the other path's copy is discarded as a stale duplicate.

use crate::catchup::CatchupFetcher;
use crate::cursor::SequenceCursor;
use crate::error::{SyncError, SyncResult};
use crate::gateway::UpdateGateway;
use crate::shutdown::Shutdown;
use crate::state::{ConnectionState, SharedState};
use livelog_protocol::{Update, UpdateEnvelope};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Consumer callback: `(seq, update-or-none)`, strictly increasing in seq,
/// exactly one call per sequence number.
pub(crate) type UpdateCallback = Box<dyn FnMut(u64, Option<Update>) + Send>;

/// Enforces ordering and exactly-once application.
pub(crate) struct Reconciler<G> {
    cursor: Arc<SequenceCursor>,
    pending: BTreeMap<u64, Option<Update>>,
    fetcher: CatchupFetcher<G>,
    on_update: UpdateCallback,
    shared: Arc<SharedState>,
    cooldown: Duration,
}

impl<G: UpdateGateway> Reconciler<G> {
    pub fn new(
        cursor: Arc<SequenceCursor>,
        fetcher: CatchupFetcher<G>,
        on_update: UpdateCallback,
        shared: Arc<SharedState>,
        cooldown: Duration,
    ) -> Self {
        Self {
            cursor,
            pending: BTreeMap::new(),
            fetcher,
            on_update,
            shared,
            cooldown,
        }
    }

    /// The cursor position (highest sequence applied).
    pub fn position(&self) -> u64 {
        self.cursor.current()
    }

    fn expected_next(&self) -> u64 {
        self.cursor.current() + 1
    }

    /// Handles one data-carrying envelope from the push stream.
    ///
    /// `payload` is `None` when the frame's data failed to parse; the
    /// sequence slot is consumed either way.
    pub async fn on_envelope(
        &mut self,
        envelope: UpdateEnvelope,
        shutdown: &mut Shutdown,
    ) -> SyncResult<()> {
        let expected = self.expected_next();
        if envelope.seq == expected {
            self.apply(envelope.seq, envelope.payload);
            self.drain_ready();
            Ok(())
        } else if envelope.seq < expected {
            debug!(seq = envelope.seq, expected, "discarding stale duplicate");
            self.shared.record(|s| s.duplicates_discarded += 1);
            Ok(())
        } else {
            debug!(seq = envelope.seq, expected, "gap ahead of live stream");
            self.shared.record(|s| s.gaps_detected += 1);
            self.pending.insert(envelope.seq, envelope.payload);
            self.close_gaps(shutdown).await
        }
    }

    /// Handles a heartbeat: the server's current sequence with no payload.
    ///
    /// A heartbeat at or behind the cursor is the idle case and is dropped.
    /// A heartbeat ahead of the cursor is evidence of missed events, so it
    /// forces a catch-up *through* its sequence — the heartbeat itself
    /// never consumes a slot, the real update fetched for that sequence
    /// does.
    pub async fn on_heartbeat(&mut self, seq: u64, shutdown: &mut Shutdown) -> SyncResult<()> {
        if seq <= self.cursor.current() {
            debug!(seq, position = self.cursor.current(), "heartbeat, in sync");
            return Ok(());
        }
        debug!(seq, position = self.cursor.current(), "heartbeat ahead; catching up");
        self.shared.record(|s| s.gaps_detected += 1);
        self.run_catchup(seq, shutdown).await?;
        self.close_gaps(shutdown).await
    }

    /// Forces the cursor up to at least `target` (reconnect re-validation
    /// and session start), then settles any buffered envelopes.
    pub async fn ensure_caught_up(
        &mut self,
        target: u64,
        shutdown: &mut Shutdown,
    ) -> SyncResult<()> {
        if target > self.cursor.current() {
            info!(target_seq = target, position = self.cursor.current(), "server is ahead; catching up");
            self.shared.record(|s| s.gaps_detected += 1);
            self.run_catchup(target, shutdown).await?;
        }
        self.close_gaps(shutdown).await
    }

    /// Settles the pending buffer: applies what is contiguous, discards
    /// what went stale, and catches up across any gap that remains. Each
    /// round strictly increases the cursor, so this terminates.
    async fn close_gaps(&mut self, shutdown: &mut Shutdown) -> SyncResult<()> {
        loop {
            self.drain_ready();
            let Some((&first, _)) = self.pending.first_key_value() else {
                return Ok(());
            };
            // first > expected_next here, so the floor target never
            // regresses below the cursor.
            self.run_catchup(first - 1, shutdown).await?;
        }
    }

    /// Applies buffered envelopes the cursor has reached and discards the
    /// ones it has passed.
    fn drain_ready(&mut self) {
        loop {
            let expected = self.expected_next();
            let Some((&first, _)) = self.pending.first_key_value() else {
                return;
            };
            if first < expected {
                self.pending.pop_first();
                self.shared.record(|s| s.duplicates_discarded += 1);
            } else if first == expected {
                let (seq, payload) = self.pending.pop_first().unwrap();
                self.apply(seq, payload);
            } else {
                return;
            }
        }
    }

    /// Runs one catch-up to at least `target`, cooling down and retrying
    /// for as long as the failure is the degraded-but-alive kind.
    async fn run_catchup(&mut self, target: u64, shutdown: &mut Shutdown) -> SyncResult<()> {
        loop {
            self.shared.set_connection_state(ConnectionState::CatchingUp);

            let on_update = &mut self.on_update;
            let shared = &self.shared;
            let mut emit = |seq: u64, payload: Option<Update>| {
                shared.record(|s| s.updates_applied += 1);
                (on_update)(seq, payload);
            };

            match self
                .fetcher
                .catch_up_to(&self.cursor, target, shutdown, &mut emit)
                .await
            {
                Ok(()) => {
                    self.shared.record(|s| s.catchups_completed += 1);
                    info!(target_seq = target, position = self.cursor.current(), "catch-up complete");
                    return Ok(());
                }
                Err(SyncError::CatchupFailed { target, reason }) => {
                    warn!(
                        target_seq = target,
                        %reason,
                        cooldown = ?self.cooldown,
                        "catch-up failed; cooling down"
                    );
                    self.shared
                        .record(|s| s.last_error = Some(reason.clone()));
                    tokio::select! {
                        biased;
                        _ = shutdown.triggered() => return Err(SyncError::Cancelled),
                        _ = tokio::time::sleep(self.cooldown) => {}
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Applies one envelope downstream and moves the cursor over it.
    fn apply(&mut self, seq: u64, payload: Option<Update>) {
        self.shared.record(|s| s.updates_applied += 1);
        (self.on_update)(seq, payload);
        if let Err(err) = self.cursor.advance_to(seq) {
            error!(error = %err, "cursor refused live advance");
        }
    }
}
