//! # LiveLog Reference Server
//!
//! In-memory update log server for LiveLog.
//!
//! This crate provides:
//! - An append-only update log with monotonic sequence assignment
//! - Paginated diff reads with a retention floor
//! - Per-subscriber push channels with heartbeats
//! - Fault-injection hooks (silent appends, forced disconnects,
//!   history truncation)
//!
//! # Architecture
//!
//! The server mirrors the three capabilities the sync engine's gateway
//! needs — current sequence, diff page, push channel — so integration
//! tests and the CLI demo can run the whole synchronization loop in one
//! process. It is not a network server: wiring these handlers to HTTP/SSE
//! is the production backend's job and is out of scope here.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod log;
mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use log::UpdateLog;
pub use server::LogServer;
