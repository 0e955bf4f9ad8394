//! The envelope handed between sync engine components.

use crate::update::Update;

/// A sequenced update as observed on either delivery path.
///
/// `payload` is `None` for heartbeats and for payloads that failed to parse
/// against the known update schema; the sequence slot is consumed either
/// way. Envelopes are only meaningful relative to the log ordering and are
/// never coalesced or reordered.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateEnvelope {
    /// Position of this event in the account's log.
    pub seq: u64,
    /// The parsed event, if there was one and it was recognized.
    pub payload: Option<Update>,
}

impl UpdateEnvelope {
    /// Creates an envelope carrying a parsed update.
    pub fn update(seq: u64, update: Update) -> Self {
        Self {
            seq,
            payload: Some(update),
        }
    }

    /// Creates a payload-less envelope (heartbeat or unparseable event).
    pub fn heartbeat(seq: u64) -> Self {
        Self { seq, payload: None }
    }

    /// Returns true if this envelope carries a parsed update.
    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }
}
