//! The reference log server.

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::log::UpdateLog;
use livelog_protocol::{DiffPage, StreamFrame};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// An in-memory update log server.
///
/// Serves the same three capabilities a production backend would: the
/// current sequence, paginated diffs, and a push channel per subscriber.
/// Fault-injection hooks ([`publish_silent`](LogServer::publish_silent),
/// [`disconnect_all`](LogServer::disconnect_all),
/// [`truncate_before`](LogServer::truncate_before)) let tests and demos
/// reproduce dropped messages, dead connections and expired history.
///
/// # Example
///
/// ```
/// use livelog_server::{LogServer, ServerConfig};
/// use serde_json::json;
///
/// let server = LogServer::new(ServerConfig::default());
/// let _stream = server.subscribe();
/// let seq = server.publish(json!({ "type": "feed-posted" }));
/// assert_eq!(seq, 1);
/// assert_eq!(server.current_seq(), 1);
/// ```
pub struct LogServer {
    config: ServerConfig,
    log: Arc<UpdateLog>,
    subscribers: Mutex<Vec<mpsc::Sender<StreamFrame>>>,
}

impl LogServer {
    /// Creates a server with an empty log.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            log: Arc::new(UpdateLog::new()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Creates a server over an existing log.
    pub fn with_log(config: ServerConfig, log: Arc<UpdateLog>) -> Self {
        Self {
            config,
            log,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Returns the server's current sequence number.
    pub fn current_seq(&self) -> u64 {
        self.log.latest_seq()
    }

    /// Appends an update and pushes it to every subscriber.
    pub fn publish(&self, update: Value) -> u64 {
        let seq = self.log.append(update.clone());
        self.broadcast(StreamFrame::update(seq, update));
        seq
    }

    /// Appends an update without pushing it: the dropped-message fault.
    /// Subscribers only learn about it from a later frame, a heartbeat, or
    /// a reconnect probe.
    pub fn publish_silent(&self, update: Value) -> u64 {
        self.log.append(update)
    }

    /// Pushes a payload-less frame carrying the current sequence.
    pub fn heartbeat(&self) {
        self.broadcast(StreamFrame::heartbeat(self.current_seq()));
    }

    /// Returns the diff page after cursor `after`.
    pub fn diff_since(&self, after: u64) -> ServerResult<DiffPage> {
        self.log.page_after(after, self.config.page_size)
    }

    /// Opens a push channel. Frames published from now on are delivered in
    /// order until the subscriber lags too far or is disconnected.
    pub fn subscribe(&self) -> mpsc::Receiver<StreamFrame> {
        let (tx, rx) = mpsc::channel(self.config.subscriber_capacity);
        self.subscribers.lock().push(tx);
        debug!(subscribers = self.subscriber_count(), "subscriber attached");
        rx
    }

    /// Returns the number of attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Drops every push channel: the lost-connection fault.
    pub fn disconnect_all(&self) {
        let dropped = {
            let mut subscribers = self.subscribers.lock();
            let count = subscribers.len();
            subscribers.clear();
            count
        };
        debug!(dropped, "all subscribers disconnected");
    }

    /// Raises the retention floor, expiring old cursors.
    pub fn truncate_before(&self, seq: u64) {
        self.log.truncate_before(seq);
    }

    fn broadcast(&self, frame: StreamFrame) {
        self.subscribers.lock().retain(|tx| {
            match tx.try_send(frame.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(seq = frame.seq, "subscriber lagged; dropping its connection");
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(n: u64) -> Value {
        json!({ "type": "feed-posted", "n": n })
    }

    #[tokio::test]
    async fn publish_reaches_subscribers_in_order() {
        let server = LogServer::new(ServerConfig::default());
        let mut stream = server.subscribe();

        server.publish(entry(1));
        server.publish(entry(2));

        let first = stream.recv().await.unwrap();
        assert_eq!(first.seq, 1);
        assert!(first.data.is_some());
        assert_eq!(stream.recv().await.unwrap().seq, 2);
    }

    #[tokio::test]
    async fn silent_publish_skips_the_stream() {
        let server = LogServer::new(ServerConfig::default());
        let mut stream = server.subscribe();

        server.publish_silent(entry(1));
        server.publish(entry(2));

        // The subscriber sees only seq 2; the log still holds both.
        assert_eq!(stream.recv().await.unwrap().seq, 2);
        assert_eq!(server.current_seq(), 2);
        assert_eq!(server.diff_since(0).unwrap().updates.len(), 2);
    }

    #[tokio::test]
    async fn heartbeat_carries_the_current_seq() {
        let server = LogServer::new(ServerConfig::default());
        let mut stream = server.subscribe();

        server.publish_silent(entry(1));
        server.heartbeat();

        let frame = stream.recv().await.unwrap();
        assert_eq!(frame.seq, 1);
        assert!(frame.data.is_none());
    }

    #[tokio::test]
    async fn disconnect_all_ends_streams() {
        let server = LogServer::new(ServerConfig::default());
        let mut stream = server.subscribe();
        assert_eq!(server.subscriber_count(), 1);

        server.disconnect_all();
        assert_eq!(server.subscriber_count(), 0);
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn lagging_subscriber_is_dropped() {
        let server = LogServer::new(ServerConfig::new().with_subscriber_capacity(1));
        let _stream = server.subscribe();

        server.publish(entry(1));
        server.publish(entry(2));

        assert_eq!(server.subscriber_count(), 0);
    }

    #[test]
    fn diff_pagination_and_retention() {
        let server = LogServer::new(ServerConfig::new().with_page_size(2));
        for n in 1..=5 {
            server.publish_silent(entry(n));
        }

        let page = server.diff_since(0).unwrap();
        assert_eq!(page.updates.len(), 2);
        assert!(page.has_more);

        server.truncate_before(4);
        assert!(server.diff_since(0).is_err());
        assert_eq!(server.diff_since(3).unwrap().updates.len(), 2);
    }

    #[test]
    fn shared_log_between_servers() {
        let log = Arc::new(UpdateLog::new());
        let a = LogServer::with_log(ServerConfig::default(), Arc::clone(&log));
        let b = LogServer::with_log(ServerConfig::default(), Arc::clone(&log));

        a.publish_silent(entry(1));
        assert_eq!(b.current_seq(), 1);
    }
}
