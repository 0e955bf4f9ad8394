//! Cooperative shutdown signal shared by engine tasks.

use tokio::sync::watch;

/// A clonable listener for the engine's shutdown signal.
///
/// Every suspension point in the run loop selects on this so that `stop()`
/// aborts backoff waits, in-flight catch-ups and reconnect attempts
/// promptly rather than on the next scheduled attempt. Dropping the trigger
/// counts as shutdown, so an engine dropped without `stop()` still winds
/// its task down.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Creates a trigger/listener pair.
    pub fn channel() -> (watch::Sender<bool>, Shutdown) {
        let (tx, rx) = watch::channel(false);
        (tx, Shutdown { rx })
    }

    /// Resolves once shutdown has been requested or the trigger dropped.
    pub async fn triggered(&mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Returns true if shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}
