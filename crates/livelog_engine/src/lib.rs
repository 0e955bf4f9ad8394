//! # LiveLog Sync Engine
//!
//! Client-side replica engine for a server-authoritative, strictly ordered
//! per-account update log.
//!
//! This crate provides:
//! - Sequence cursor (single source of truth for applied position)
//! - Gap detection and paginated catch-up through the diff API
//! - Push-stream lifecycle with backoff reconnect and re-validation
//! - Reconciliation of the live and catch-up delivery paths
//! - Retry policy with exponential backoff and jitter
//! - The `SyncEngine` façade (`start`/`stop`/one ordered callback)
//!
//! ## Architecture
//!
//! The engine runs a **hybrid delivery model**: a long-lived push stream
//! for low latency, backed by a pull-based diff API that can replay any
//! range of the log by sequence number. All application happens on a single
//! task, gated by the cursor's monotonic invariant:
//!
//! 1. A frame at exactly the next sequence applies directly
//! 2. A frame behind the cursor is a stale duplicate and is dropped
//! 3. A frame ahead of the cursor is buffered while a catch-up closes the
//!    gap; whichever path reaches a sequence first wins
//!
//! After every (re)connect the engine probes the server's current sequence
//! instead of trusting stream continuity, so events missed entirely during
//! an outage are recovered the same way.
//!
//! ## Key Invariants
//!
//! - The consumer observes every sequence exactly once, in order
//! - The cursor never moves backward within a session
//! - Unrecognized payloads consume their slot (delivered as `None`)
//! - Transient failures retry forever; terminal failures stop the engine
//! - `stop()` aborts promptly, even mid-backoff

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod catchup;
mod config;
mod cursor;
mod engine;
mod error;
mod gateway;
mod reconcile;
mod retry;
mod shutdown;
mod state;
mod stream;

pub use config::SyncConfig;
pub use cursor::SequenceCursor;
pub use engine::SyncEngine;
pub use error::{GatewayError, GatewayResult, SyncError, SyncResult};
pub use gateway::{MockGateway, StreamHandle, UpdateGateway};
pub use retry::{RetryConfig, RetryPolicy};
pub use shutdown::Shutdown;
pub use state::{ConnectionState, SyncStats};
