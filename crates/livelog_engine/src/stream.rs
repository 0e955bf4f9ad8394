//! Push-connection lifecycle and frame intake.
//!
//! The consumer owns one connection at a time: connect (with unbounded
//! backoff), re-validate continuity against the server's current sequence,
//! then feed frames to the reconciler until the connection dies, and start
//! over. The engine never trusts a freshly connected stream to be
//! continuous with the previous one.

use crate::error::{SyncError, SyncResult};
use crate::gateway::UpdateGateway;
use crate::reconcile::Reconciler;
use crate::retry::RetryPolicy;
use crate::shutdown::Shutdown;
use crate::state::{ConnectionState, SharedState};
use livelog_protocol::{StreamFrame, Update, UpdateEnvelope};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Parses a raw payload, tolerating unknown variants.
///
/// An unrecognized event must not desynchronize the replica from the
/// server's counter: the anomaly is logged and counted, and the caller
/// delivers `None` for the slot.
pub(crate) fn decode_payload(seq: u64, raw: Value, shared: &SharedState) -> Option<Update> {
    match Update::from_value(raw) {
        Ok(update) => Some(update),
        Err(err) => {
            shared.record(|s| s.parse_failures += 1);
            warn!(seq, error = %err, "payload did not match any known update variant");
            None
        }
    }
}

/// Drives the push connection and hands envelopes to the reconciler.
pub(crate) struct StreamConsumer<G: UpdateGateway> {
    gateway: Arc<G>,
    reconciler: Reconciler<G>,
    reconnect: RetryPolicy,
    shared: Arc<SharedState>,
    shutdown: Shutdown,
}

impl<G: UpdateGateway> StreamConsumer<G> {
    pub fn new(
        gateway: Arc<G>,
        reconciler: Reconciler<G>,
        reconnect: RetryPolicy,
        shared: Arc<SharedState>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            gateway,
            reconciler,
            reconnect,
            shared,
            shutdown,
        }
    }

    /// Runs until shutdown or a terminal error.
    pub async fn run(mut self) {
        match self.run_inner().await {
            Ok(()) | Err(SyncError::Cancelled) => {
                info!(position = self.reconciler.position(), "sync stopped");
            }
            Err(err) => {
                error!(error = %err, "sync terminated");
                self.shared.record(|s| s.last_error = Some(err.to_string()));
            }
        }
        self.shared.set_connection_state(ConnectionState::Disconnected);
    }

    async fn run_inner(&mut self) -> SyncResult<()> {
        loop {
            self.shared.set_connection_state(ConnectionState::Connecting);

            let gateway = Arc::clone(&self.gateway);
            let mut handle = self
                .reconnect
                .run(&mut self.shutdown, || {
                    let gateway = Arc::clone(&gateway);
                    async move { gateway.open_stream().await.map_err(SyncError::from) }
                })
                .await?;

            // Never trust continuity across a (re)connect: ask the server
            // where it stands and close any window the outage opened.
            let remote = self
                .reconnect
                .run(&mut self.shutdown, || {
                    let gateway = Arc::clone(&gateway);
                    async move { gateway.current_seq().await.map_err(SyncError::from) }
                })
                .await?;
            info!(remote, position = self.reconciler.position(), "push stream connected");

            self.reconciler
                .ensure_caught_up(remote, &mut self.shutdown)
                .await?;
            self.shared.set_connection_state(ConnectionState::Streaming);

            loop {
                let frame = tokio::select! {
                    biased;
                    _ = self.shutdown.triggered() => return Err(SyncError::Cancelled),
                    frame = handle.next_frame() => frame,
                };

                let Some(frame) = frame else {
                    warn!(position = self.reconciler.position(), "push stream lost; reconnecting");
                    self.shared.record(|s| s.reconnects += 1);
                    self.shared.set_connection_state(ConnectionState::Disconnected);
                    break;
                };

                self.handle_frame(frame).await?;
                if self.shared.connection_state() == ConnectionState::CatchingUp {
                    self.shared.set_connection_state(ConnectionState::Streaming);
                }
            }
        }
    }

    async fn handle_frame(&mut self, frame: StreamFrame) -> SyncResult<()> {
        match frame.data {
            None => {
                debug!(seq = frame.seq, "heartbeat frame");
                self.reconciler
                    .on_heartbeat(frame.seq, &mut self.shutdown)
                    .await
            }
            Some(raw) => {
                let payload = decode_payload(frame.seq, raw, &self.shared);
                self.reconciler
                    .on_envelope(
                        UpdateEnvelope {
                            seq: frame.seq,
                            payload,
                        },
                        &mut self.shutdown,
                    )
                    .await
            }
        }
    }
}
