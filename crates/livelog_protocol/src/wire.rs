//! JSON wire types for the update endpoints.
//!
//! Field names match the server's `/app/updates/*` surface: the diff
//! response carries `seq` (the cursor after the page), `hasMore` and a raw
//! `updates` array; stream frames carry `seq` and an optional `data`
//! payload. Updates stay raw [`Value`]s here so that a payload the client
//! cannot parse still occupies its position in the page.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One framed message from the push stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamFrame {
    /// Sequence number the frame refers to.
    pub seq: u64,
    /// Raw update payload; absent for heartbeats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl StreamFrame {
    /// Creates a frame carrying an update payload.
    pub fn update(seq: u64, data: Value) -> Self {
        Self {
            seq,
            data: Some(data),
        }
    }

    /// Creates a heartbeat frame carrying only the sequence number.
    pub fn heartbeat(seq: u64) -> Self {
        Self { seq, data: None }
    }
}

/// The result of one diff fetch.
///
/// `updates` are contiguous and strictly increasing in sequence starting
/// from the requested cursor + 1; `next_seq` is the cursor after the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffPage {
    /// Cursor position after applying this page.
    #[serde(rename = "seq")]
    pub next_seq: u64,
    /// True if the server has further updates beyond this page.
    pub has_more: bool,
    /// Raw updates, in log order.
    pub updates: Vec<Value>,
}

impl DiffPage {
    /// Creates a diff page.
    pub fn new(next_seq: u64, has_more: bool, updates: Vec<Value>) -> Self {
        Self {
            next_seq,
            has_more,
            updates,
        }
    }

    /// Creates a page signalling "already caught up" at the given cursor.
    pub fn empty(next_seq: u64) -> Self {
        Self::new(next_seq, false, Vec::new())
    }
}

/// Response of the current-sequence probe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeqResponse {
    /// The server's current sequence number.
    pub seq: u64,
}
