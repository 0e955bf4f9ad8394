//! Error types for the sync engine.

use thiserror::Error;

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced by the transport gateway.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Authentication rejected; the session must re-authenticate.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// The requested sequence predates the server's retained history.
    #[error("cursor {requested} predates the server's retained history")]
    UnknownCursor {
        /// The sequence number that was requested.
        requested: u64,
    },
}

impl GatewayError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }
}

/// Errors that can occur during synchronization.
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Authentication rejected; terminal for the session.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// The cursor predates the server's retained history; terminal, a full
    /// state reload is required.
    #[error("cursor {requested} predates the server's retained history")]
    UnknownCursor {
        /// The sequence number that was requested.
        requested: u64,
    },

    /// A catch-up run could not complete; the engine cools down and retries.
    #[error("catch-up to {target} failed: {reason}")]
    CatchupFailed {
        /// The sequence the catch-up was trying to reach.
        target: u64,
        /// What went wrong.
        reason: String,
    },

    /// The cursor was asked to move backward. Programming-error class: this
    /// must never occur in correct operation.
    #[error("cursor regression: at {current}, asked to move back to {requested}")]
    Regression {
        /// Position the cursor holds.
        current: u64,
        /// Position that was requested.
        requested: u64,
    },

    /// The operation was cancelled by shutdown.
    #[error("sync cancelled")]
    Cancelled,

    /// `start()` was called while a run loop is already live.
    #[error("engine is already running")]
    AlreadyRunning,
}

impl From<GatewayError> for SyncError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Transport { message, retryable } => {
                SyncError::Transport { message, retryable }
            }
            GatewayError::Auth(message) => SyncError::Auth(message),
            GatewayError::UnknownCursor { requested } => SyncError::UnknownCursor { requested },
        }
    }
}

impl SyncError {
    /// Returns true if retrying the failed operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Transport {
                retryable: true,
                ..
            }
        )
    }

    /// Returns true if the error ends the session: the engine stops itself
    /// and requires external re-initialization.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncError::Auth(_) | SyncError::UnknownCursor { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::from(GatewayError::transport_retryable("connection lost")).is_retryable());
        assert!(!SyncError::from(GatewayError::transport_fatal("bad certificate")).is_retryable());
        assert!(!SyncError::Auth("expired token".into()).is_retryable());
        assert!(!SyncError::UnknownCursor { requested: 3 }.is_retryable());
        assert!(!SyncError::Cancelled.is_retryable());
    }

    #[test]
    fn terminal_errors() {
        assert!(SyncError::Auth("expired token".into()).is_terminal());
        assert!(SyncError::UnknownCursor { requested: 3 }.is_terminal());
        assert!(!SyncError::Transport {
            message: "x".into(),
            retryable: true
        }
        .is_terminal());
        assert!(!SyncError::Cancelled.is_terminal());
        assert!(!SyncError::CatchupFailed {
            target: 9,
            reason: "retries exhausted".into()
        }
        .is_terminal());
    }

    #[test]
    fn error_display() {
        let err = SyncError::Regression {
            current: 10,
            requested: 5,
        };
        assert!(err.to_string().contains("10"));
        assert!(err.to_string().contains("5"));

        let err = SyncError::UnknownCursor { requested: 7 };
        assert!(err.to_string().contains("7"));
    }
}
