//! Transport gateway abstraction and test double.
//!
//! The gateway is the engine's only window onto the network. It is
//! deliberately narrow: a sequence probe, a diff fetch, and a push
//! connection. Implementations decide what the transport actually is
//! (HTTP + SSE in production, an in-process log server in tests and
//! demos); the engine never sees past this trait.

use crate::error::{GatewayError, GatewayResult};
use livelog_protocol::{DiffPage, StreamFrame};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// A live push connection.
///
/// Yields frames until the connection errors out or the server closes it;
/// both present as end-of-stream. The engine re-validates continuity after
/// every reconnect, so the two cases need no distinction here.
#[derive(Debug)]
pub struct StreamHandle {
    frames: mpsc::Receiver<StreamFrame>,
}

impl StreamHandle {
    /// Wraps a frame channel.
    pub fn new(frames: mpsc::Receiver<StreamFrame>) -> Self {
        Self { frames }
    }

    /// Receives the next frame; `None` means the connection is gone.
    pub async fn next_frame(&mut self) -> Option<StreamFrame> {
        self.frames.recv().await
    }
}

/// The three transport capabilities the engine needs.
///
/// Implementations are stateless from the engine's perspective and are
/// shared behind an `Arc`; all calls must be safe to issue concurrently.
pub trait UpdateGateway: Send + Sync + 'static {
    /// Fetches the server's current sequence number.
    fn current_seq(&self) -> impl Future<Output = GatewayResult<u64>> + Send;

    /// Fetches the diff page after sequence `after`.
    fn diff_since(&self, after: u64) -> impl Future<Output = GatewayResult<DiffPage>> + Send;

    /// Opens a push connection authenticated for the session.
    fn open_stream(&self) -> impl Future<Output = GatewayResult<StreamHandle>> + Send;
}

impl<T: UpdateGateway> UpdateGateway for std::sync::Arc<T> {
    fn current_seq(&self) -> impl Future<Output = GatewayResult<u64>> + Send {
        (**self).current_seq()
    }

    fn diff_since(&self, after: u64) -> impl Future<Output = GatewayResult<DiffPage>> + Send {
        (**self).diff_since(after)
    }

    fn open_stream(&self) -> impl Future<Output = GatewayResult<StreamHandle>> + Send {
        (**self).open_stream()
    }
}

/// A scripted gateway for tests.
///
/// Responses queue per operation; when a queue is empty the mock falls
/// back to answering probes from `server_seq` and diffs with an empty
/// caught-up page. Frames are injected into the currently open stream with
/// [`MockGateway::emit`], and [`MockGateway::close_stream`] simulates
/// connection loss.
#[derive(Debug, Default)]
pub struct MockGateway {
    server_seq: AtomicU64,
    seq_script: Mutex<VecDeque<GatewayResult<u64>>>,
    diff_script: Mutex<VecDeque<GatewayResult<DiffPage>>>,
    open_script: Mutex<VecDeque<GatewayError>>,
    stream_tx: Mutex<Option<mpsc::Sender<StreamFrame>>>,
    seq_calls: AtomicUsize,
    diff_calls: AtomicUsize,
    streams_opened: AtomicUsize,
}

impl MockGateway {
    /// Creates a new mock gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the fallback sequence returned when no probe is scripted.
    pub fn set_server_seq(&self, seq: u64) {
        self.server_seq.store(seq, Ordering::SeqCst);
    }

    /// Queues a response for the next sequence probe.
    pub fn push_seq(&self, response: GatewayResult<u64>) {
        self.seq_script.lock().unwrap().push_back(response);
    }

    /// Queues a response for the next diff fetch.
    pub fn push_diff(&self, response: GatewayResult<DiffPage>) {
        self.diff_script.lock().unwrap().push_back(response);
    }

    /// Queues a failure for the next stream-open attempt.
    pub fn push_open_error(&self, error: GatewayError) {
        self.open_script.lock().unwrap().push_back(error);
    }

    /// Injects a frame into the currently open stream.
    pub async fn emit(&self, frame: StreamFrame) {
        let tx = self.stream_tx.lock().unwrap().clone();
        if let Some(tx) = tx {
            let _ = tx.send(frame).await;
        }
    }

    /// Drops the open stream, simulating connection loss.
    pub fn close_stream(&self) {
        *self.stream_tx.lock().unwrap() = None;
    }

    /// Returns the number of sequence probes issued.
    pub fn seq_calls(&self) -> usize {
        self.seq_calls.load(Ordering::SeqCst)
    }

    /// Returns the number of diff fetches issued.
    pub fn diff_calls(&self) -> usize {
        self.diff_calls.load(Ordering::SeqCst)
    }

    /// Returns the number of streams opened.
    pub fn streams_opened(&self) -> usize {
        self.streams_opened.load(Ordering::SeqCst)
    }
}

impl UpdateGateway for MockGateway {
    fn current_seq(&self) -> impl Future<Output = GatewayResult<u64>> + Send {
        self.seq_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.seq_script.lock().unwrap().pop_front();
        let fallback = self.server_seq.load(Ordering::SeqCst);
        async move { scripted.unwrap_or(Ok(fallback)) }
    }

    fn diff_since(&self, after: u64) -> impl Future<Output = GatewayResult<DiffPage>> + Send {
        self.diff_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.diff_script.lock().unwrap().pop_front();
        async move { scripted.unwrap_or(Ok(DiffPage::empty(after))) }
    }

    fn open_stream(&self) -> impl Future<Output = GatewayResult<StreamHandle>> + Send {
        self.streams_opened.fetch_add(1, Ordering::SeqCst);
        let scripted = self.open_script.lock().unwrap().pop_front();
        let result = match scripted {
            Some(error) => Err(error),
            None => {
                let (tx, rx) = mpsc::channel(64);
                *self.stream_tx.lock().unwrap() = Some(tx);
                Ok(StreamHandle::new(rx))
            }
        };
        async move { result }
    }
}
