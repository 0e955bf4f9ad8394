//! Paginated catch-up through the diff API.

use crate::cursor::SequenceCursor;
use crate::error::{SyncError, SyncResult};
use crate::gateway::UpdateGateway;
use crate::retry::RetryPolicy;
use crate::shutdown::Shutdown;
use crate::state::SharedState;
use crate::stream::decode_payload;
use livelog_protocol::Update;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Applies one sequenced update (or the unknown-payload marker) downstream.
pub(crate) type EmitFn<'a> = &'a mut (dyn FnMut(u64, Option<Update>) + Send);

/// Replays a range of the log by walking diff pages.
pub(crate) struct CatchupFetcher<G> {
    gateway: Arc<G>,
    retry: RetryPolicy,
    shared: Arc<SharedState>,
}

impl<G: UpdateGateway> CatchupFetcher<G> {
    pub fn new(gateway: Arc<G>, retry: RetryPolicy, shared: Arc<SharedState>) -> Self {
        Self {
            gateway,
            retry,
            shared,
        }
    }

    /// Catches the cursor up to at least `target`.
    ///
    /// Fetches the page after the cursor, applies each update via `emit`
    /// and advances the cursor per update, then repeats until the cursor
    /// reaches `target`. A page may run past `target` when the server
    /// advanced during the fetch; everything received is applied, and the
    /// fetcher does not chase further.
    ///
    /// Retry exhaustion and no-progress pages surface
    /// [`SyncError::CatchupFailed`]; terminal gateway errors and
    /// cancellation propagate unchanged.
    pub async fn catch_up_to(
        &self,
        cursor: &SequenceCursor,
        target: u64,
        shutdown: &mut Shutdown,
        emit: EmitFn<'_>,
    ) -> SyncResult<()> {
        loop {
            let after = cursor.current();
            if after >= target {
                return Ok(());
            }

            let gateway = Arc::clone(&self.gateway);
            let fetched = self
                .retry
                .run(shutdown, || {
                    let gateway = Arc::clone(&gateway);
                    async move { gateway.diff_since(after).await.map_err(SyncError::from) }
                })
                .await;

            let page = match fetched {
                Ok(page) => page,
                Err(err) if err.is_terminal() || matches!(err, SyncError::Cancelled) => {
                    return Err(err)
                }
                Err(err) => {
                    return Err(SyncError::CatchupFailed {
                        target,
                        reason: err.to_string(),
                    })
                }
            };

            self.shared.record(|s| s.pages_fetched += 1);
            debug!(
                after,
                next_seq = page.next_seq,
                count = page.updates.len(),
                has_more = page.has_more,
                "diff page"
            );

            let mut seq = after;
            for raw in page.updates {
                seq += 1;
                let payload = decode_payload(seq, raw, &self.shared);
                emit(seq, payload);
                if let Err(err) = cursor.advance_to(seq) {
                    error!(error = %err, "cursor refused catch-up advance");
                }
            }

            // Contiguity invariant: next_seq == after + updates.len(). A page
            // that claims more ground than it carries gets followed anyway so
            // the cursor cannot wedge below the server's floor.
            if page.next_seq > cursor.current() {
                warn!(
                    position = cursor.current(),
                    next_seq = page.next_seq,
                    "diff page ran past its updates; following the server cursor"
                );
                if let Err(err) = cursor.advance_to(page.next_seq) {
                    error!(error = %err, "cursor refused page advance");
                }
            }

            if cursor.current() == after {
                return Err(SyncError::CatchupFailed {
                    target,
                    reason: format!("diff after {after} made no progress"),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::gateway::MockGateway;
    use crate::retry::RetryConfig;
    use livelog_protocol::DiffPage;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn feed_post(n: u64) -> Value {
        json!({
            "type": "feed-posted",
            "source": "home",
            "by": "u-1",
            "date": 1000 + n,
            "repeatKey": null,
            "seq": n,
            "content": { "kind": "text", "text": format!("post {n}") }
        })
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            RetryConfig::new(max_attempts)
                .with_initial_delay(Duration::from_millis(1))
                .with_max_delay(Duration::from_millis(2))
                .without_jitter(),
        )
    }

    fn fetcher(gateway: &Arc<MockGateway>, attempts: u32) -> CatchupFetcher<MockGateway> {
        CatchupFetcher::new(
            Arc::clone(gateway),
            fast_retry(attempts),
            Arc::new(SharedState::new()),
        )
    }

    async fn run_catchup(
        fetcher: &CatchupFetcher<MockGateway>,
        cursor: &SequenceCursor,
        target: u64,
    ) -> (SyncResult<()>, Vec<(u64, bool)>) {
        let (_tx, mut shutdown) = Shutdown::channel();
        let mut seen = Vec::new();
        let result = fetcher
            .catch_up_to(cursor, target, &mut shutdown, &mut |seq, payload| {
                seen.push((seq, payload.is_some()));
            })
            .await;
        (result, seen)
    }

    #[tokio::test]
    async fn single_page_reaches_target() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_diff(Ok(DiffPage::new(
            3,
            false,
            vec![feed_post(1), feed_post(2), feed_post(3)],
        )));

        let cursor = SequenceCursor::new(0);
        let (result, seen) = run_catchup(&fetcher(&gateway, 3), &cursor, 3).await;

        result.unwrap();
        assert_eq!(seen, vec![(1, true), (2, true), (3, true)]);
        assert_eq!(cursor.current(), 3);
        assert_eq!(gateway.diff_calls(), 1);
    }

    #[tokio::test]
    async fn paginates_until_target() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_diff(Ok(DiffPage::new(2, true, vec![feed_post(1), feed_post(2)])));
        gateway.push_diff(Ok(DiffPage::new(4, false, vec![feed_post(3), feed_post(4)])));

        let cursor = SequenceCursor::new(0);
        let (result, seen) = run_catchup(&fetcher(&gateway, 3), &cursor, 4).await;

        result.unwrap();
        assert_eq!(seen.len(), 4);
        assert_eq!(cursor.current(), 4);
        assert_eq!(gateway.diff_calls(), 2);
    }

    #[tokio::test]
    async fn applies_the_whole_page_past_the_target() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_diff(Ok(DiffPage::new(
            5,
            false,
            (1..=5).map(feed_post).collect(),
        )));

        let cursor = SequenceCursor::new(0);
        let (result, seen) = run_catchup(&fetcher(&gateway, 3), &cursor, 2).await;

        result.unwrap();
        assert_eq!(seen.len(), 5);
        assert_eq!(cursor.current(), 5);
    }

    #[tokio::test]
    async fn already_at_target_fetches_nothing() {
        let gateway = Arc::new(MockGateway::new());
        let cursor = SequenceCursor::new(9);
        let (result, seen) = run_catchup(&fetcher(&gateway, 3), &cursor, 9).await;

        result.unwrap();
        assert!(seen.is_empty());
        assert_eq!(gateway.diff_calls(), 0);
    }

    #[tokio::test]
    async fn unparseable_element_still_consumes_its_slot() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_diff(Ok(DiffPage::new(
            3,
            false,
            vec![feed_post(1), json!({ "type": "wormhole-opened" }), feed_post(3)],
        )));

        let cursor = SequenceCursor::new(0);
        let (result, seen) = run_catchup(&fetcher(&gateway, 3), &cursor, 3).await;

        result.unwrap();
        assert_eq!(seen, vec![(1, true), (2, false), (3, true)]);
        assert_eq!(cursor.current(), 3);
    }

    #[tokio::test]
    async fn retry_exhaustion_surfaces_catchup_failed() {
        let gateway = Arc::new(MockGateway::new());
        for _ in 0..2 {
            gateway.push_diff(Err(GatewayError::transport_retryable("down")));
        }

        let cursor = SequenceCursor::new(0);
        let (result, seen) = run_catchup(&fetcher(&gateway, 2), &cursor, 4).await;

        assert!(matches!(
            result,
            Err(SyncError::CatchupFailed { target: 4, .. })
        ));
        assert!(seen.is_empty());
        assert_eq!(cursor.current(), 0);
        assert_eq!(gateway.diff_calls(), 2);
    }

    #[tokio::test]
    async fn unknown_cursor_is_terminal() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_diff(Err(GatewayError::UnknownCursor { requested: 0 }));

        let cursor = SequenceCursor::new(0);
        let (result, _) = run_catchup(&fetcher(&gateway, 5), &cursor, 4).await;

        assert!(matches!(
            result,
            Err(SyncError::UnknownCursor { requested: 0 })
        ));
        assert_eq!(gateway.diff_calls(), 1);
    }

    #[tokio::test]
    async fn no_progress_page_fails_instead_of_spinning() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_diff(Ok(DiffPage::empty(0)));

        let cursor = SequenceCursor::new(0);
        let (result, _) = run_catchup(&fetcher(&gateway, 3), &cursor, 4).await;

        assert!(matches!(result, Err(SyncError::CatchupFailed { .. })));
        assert_eq!(gateway.diff_calls(), 1);
    }

    #[tokio::test]
    async fn follows_a_page_that_outruns_its_updates() {
        let gateway = Arc::new(MockGateway::new());
        // Claims ground through 4 while carrying only 1..=2.
        gateway.push_diff(Ok(DiffPage::new(4, false, vec![feed_post(1), feed_post(2)])));

        let cursor = SequenceCursor::new(0);
        let (result, seen) = run_catchup(&fetcher(&gateway, 3), &cursor, 4).await;

        result.unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(cursor.current(), 4);
    }
}
