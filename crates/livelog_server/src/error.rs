//! Error types for the reference server.

use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors the reference server can return.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// The requested cursor predates the retained portion of the log.
    ///
    /// Clients receiving this cannot be caught up incrementally and must
    /// reload their state in full.
    #[error("cursor {requested} predates retained history (retained from {retained_from})")]
    UnknownCursor {
        /// The cursor the client asked to read after.
        requested: u64,
        /// The oldest sequence the server still holds.
        retained_from: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ServerError::UnknownCursor {
            requested: 3,
            retained_from: 10,
        };
        assert!(err.to_string().contains("3"));
        assert!(err.to_string().contains("10"));
    }
}
