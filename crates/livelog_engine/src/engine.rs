//! The synchronization engine façade.

use crate::catchup::CatchupFetcher;
use crate::config::SyncConfig;
use crate::cursor::SequenceCursor;
use crate::error::{SyncError, SyncResult};
use crate::gateway::UpdateGateway;
use crate::reconcile::Reconciler;
use crate::retry::RetryPolicy;
use crate::shutdown::Shutdown;
use crate::state::{ConnectionState, SharedState, SyncStats};
use crate::stream::StreamConsumer;
use livelog_protocol::Update;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// A session-scoped update synchronization engine.
///
/// One instance serves exactly one authenticated session: create it on
/// login, [`stop`](SyncEngine::stop) and drop it on logout. Between
/// [`start`](SyncEngine::start) and `stop`, the engine delivers every
/// update from the resume point through the server's present sequence to
/// the consumer callback exactly once, in increasing sequence order, no
/// matter how often the connection drops, reorders or duplicates frames.
///
/// Dropping the engine without calling `stop` also winds the run loop
/// down, just without waiting for it.
pub struct SyncEngine<G: UpdateGateway> {
    config: SyncConfig,
    gateway: Arc<G>,
    cursor: Arc<SequenceCursor>,
    shared: Arc<SharedState>,
    running: Mutex<Option<RunningSync>>,
}

struct RunningSync {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl<G: UpdateGateway> SyncEngine<G> {
    /// Creates an engine for one session.
    pub fn new(config: SyncConfig, gateway: G) -> Self {
        let cursor = Arc::new(SequenceCursor::new(config.resume_from));
        Self {
            config,
            gateway: Arc::new(gateway),
            cursor,
            shared: Arc::new(SharedState::new()),
            running: Mutex::new(None),
        }
    }

    /// Starts the run loop. Must be called within a tokio runtime.
    ///
    /// The loop's first act is a retried `current_seq` probe, after which
    /// any gap between the cursor and the server's present is closed before
    /// live delivery begins. `on_update` receives `(seq, update-or-none)`
    /// strictly in order; it runs on the engine task, so enqueue and return
    /// quickly.
    ///
    /// Fails with [`SyncError::AlreadyRunning`] while a previous run loop
    /// is still live.
    pub fn start<F>(&self, on_update: F) -> SyncResult<()>
    where
        F: FnMut(u64, Option<Update>) + Send + 'static,
    {
        let mut running = self.running.lock();
        if let Some(current) = running.as_ref() {
            if current.task.is_finished() {
                *running = None;
            } else {
                return Err(SyncError::AlreadyRunning);
            }
        }

        let (shutdown_tx, shutdown) = Shutdown::channel();
        let fetcher = CatchupFetcher::new(
            Arc::clone(&self.gateway),
            RetryPolicy::new(self.config.catchup_retry.clone()),
            Arc::clone(&self.shared),
        );
        let reconciler = Reconciler::new(
            Arc::clone(&self.cursor),
            fetcher,
            Box::new(on_update),
            Arc::clone(&self.shared),
            self.config.catchup_cooldown,
        );
        let consumer = StreamConsumer::new(
            Arc::clone(&self.gateway),
            reconciler,
            RetryPolicy::new(self.config.reconnect_retry.clone()),
            Arc::clone(&self.shared),
            shutdown,
        );

        let task = tokio::spawn(consumer.run());
        *running = Some(RunningSync { shutdown_tx, task });
        info!(position = self.cursor.current(), "sync engine started");
        Ok(())
    }

    /// Stops the run loop and waits for it to finish.
    ///
    /// Idempotent. Backoff waits, in-flight catch-ups and reconnect
    /// attempts abort promptly; once `stop` returns, no further `on_update`
    /// call will be made. Buffered out-of-order state is discarded with the
    /// run loop; the cursor keeps its position, so a later `start` resumes
    /// where this session left off.
    pub async fn stop(&self) {
        let running = self.running.lock().take();
        let Some(running) = running else {
            return;
        };

        let _ = running.shutdown_tx.send(true);
        let _ = running.task.await;
        self.shared
            .set_connection_state(ConnectionState::Disconnected);
    }

    /// Returns true while the run loop is live.
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .map(|r| !r.task.is_finished())
            .unwrap_or(false)
    }

    /// The connection state, for diagnostics.
    pub fn state(&self) -> ConnectionState {
        self.shared.connection_state()
    }

    /// A snapshot of the session's sync counters.
    pub fn stats(&self) -> SyncStats {
        self.shared.stats()
    }

    /// Highest sequence number applied to the consumer.
    pub fn position(&self) -> u64 {
        self.cursor.current()
    }
}
