//! Tail command implementation.
//!
//! Runs a complete synchronization loop in one process: a generator task
//! publishes synthetic updates into an in-memory log server, a sync engine
//! follows the log through a local gateway, and every delivered update is
//! printed in order. The fault-injection flags exercise gap recovery,
//! reconnects and parse tolerance.

use livelog_engine::{
    GatewayError, GatewayResult, StreamHandle, SyncConfig, SyncEngine, UpdateGateway,
};
use livelog_protocol::{DiffPage, Update};
use livelog_server::{LogServer, ServerConfig, ServerError};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Options for the tail run.
pub struct TailOptions {
    /// Updates to publish.
    pub count: u64,
    /// Delay between published updates.
    pub interval: Duration,
    /// Engine resume point.
    pub resume: u64,
    /// Server diff page size.
    pub page_size: usize,
    /// Drop every Nth update from the push stream.
    pub drop_every: Option<u64>,
    /// Kill the push connection after every Nth update.
    pub disconnect_every: Option<u64>,
    /// Publish an unrecognizable payload every Nth update.
    pub malformed_every: Option<u64>,
}

/// Gateway over an in-process log server.
struct LocalGateway {
    server: Arc<LogServer>,
}

impl UpdateGateway for LocalGateway {
    fn current_seq(&self) -> impl Future<Output = GatewayResult<u64>> + Send {
        let seq = self.server.current_seq();
        async move { Ok(seq) }
    }

    fn diff_since(&self, after: u64) -> impl Future<Output = GatewayResult<DiffPage>> + Send {
        let result = self.server.diff_since(after).map_err(|err| match err {
            ServerError::UnknownCursor { requested, .. } => {
                GatewayError::UnknownCursor { requested }
            }
        });
        async move { result }
    }

    fn open_stream(&self) -> impl Future<Output = GatewayResult<StreamHandle>> + Send {
        let handle = StreamHandle::new(self.server.subscribe());
        async move { Ok(handle) }
    }
}

fn synthetic_update(n: u64) -> Value {
    if n % 5 == 0 {
        json!({
            "type": "memory-created",
            "id": format!("m-{n}"),
            "index": n / 5,
            "memory": {
                "title": format!("Memory {n}"),
                "summary": "Synthesized by the demo feed."
            }
        })
    } else {
        json!({
            "type": "feed-posted",
            "source": "demo",
            "by": "generator",
            "date": 1_700_000_000_000u64 + n,
            "repeatKey": null,
            "seq": n,
            "content": { "kind": "text", "text": format!("demo post {n}") }
        })
    }
}

fn hits(n: u64, every: Option<u64>) -> bool {
    matches!(every, Some(every) if every > 0 && n % every == 0)
}

/// Runs the tail command.
pub async fn run(options: TailOptions) -> Result<(), Box<dyn std::error::Error>> {
    let server = Arc::new(LogServer::new(
        ServerConfig::new().with_page_size(options.page_size),
    ));
    let engine = SyncEngine::new(
        SyncConfig::new().with_resume_from(options.resume),
        LocalGateway {
            server: Arc::clone(&server),
        },
    );

    engine.start(|seq, update: Option<Update>| match update {
        Some(update) => {
            let rendered = serde_json::to_string(&update)
                .unwrap_or_else(|_| "<unprintable>".to_string());
            println!("{seq:>6}  {rendered}");
        }
        None => println!("{seq:>6}  <unrecognized payload>"),
    })?;

    // Publish the feed, injecting the requested faults.
    let generator = {
        let server = Arc::clone(&server);
        let TailOptions {
            count,
            interval,
            drop_every,
            disconnect_every,
            malformed_every,
            ..
        } = options;
        tokio::spawn(async move {
            for n in 1..=count {
                let update = if hits(n, malformed_every) {
                    json!({ "type": "mystery-event", "n": n })
                } else {
                    synthetic_update(n)
                };

                if hits(n, drop_every) {
                    server.publish_silent(update);
                } else {
                    server.publish(update);
                }
                if hits(n, disconnect_every) {
                    server.disconnect_all();
                }
                tokio::time::sleep(interval).await;
            }
            // A trailing dropped update is only discoverable through the
            // liveness signal.
            server.heartbeat();
        })
    };
    generator.await?;

    // Let the engine settle on the final position.
    let target = server.current_seq();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while engine.position() < target && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    engine.stop().await;

    let stats = engine.stats();
    info!(
        position = engine.position(),
        applied = stats.updates_applied,
        gaps = stats.gaps_detected,
        reconnects = stats.reconnects,
        parse_failures = stats.parse_failures,
        "tail complete"
    );
    Ok(())
}
