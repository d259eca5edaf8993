//! Polling timeout watcher.
//!
//! Queries the block number every interval and rejects once enough blocks
//! have elapsed since the starter block. A failed query only skips the tick.

use std::sync::Arc;
use std::time::Duration;

use chainwatch_core::BlockNumberSource;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::handle::WatcherHandle;
use crate::session::Session;

/// Start a polling session and return its handle.
pub(crate) fn spawn<P>(source: Arc<P>, session: Arc<Session>, every: Duration) -> WatcherHandle
where
    P: BlockNumberSource + ?Sized,
{
    let task = tokio::spawn(poll_until_timeout(source, session.clone(), every));
    WatcherHandle::new(session, task.abort_handle())
}

/// Poll until the session rejects or stops being active.
///
/// Also the tail of a subscription session after it reverts to polling.
pub(crate) async fn poll_until_timeout<P>(source: Arc<P>, session: Arc<Session>, every: Duration)
where
    P: BlockNumberSource + ?Sized,
{
    // The first check happens one full interval after start.
    let mut ticker = time::interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if !session.is_active() {
            return;
        }
        let height = match source.block_number().await {
            Ok(height) => height,
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    starter = session.starter_block_number(),
                    "block number poll failed, skipping tick"
                );
                continue;
            }
        };
        if session.observe_height(height) {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockChain, Step};
    use crate::session::{SessionPhase, WatchMode};

    const TICK: Duration = Duration::from_secs(1);

    #[tokio::test(start_paused = true)]
    async fn rejects_on_the_tick_that_reaches_the_threshold() {
        let chain = Arc::new(MockChain::polling([101, 102, 103, 104, 105]));
        let (session, failure) = Session::new(100, 5, None, WatchMode::Polling);
        let handle = spawn(chain.clone(), session, TICK);

        let err = failure.await;
        assert_eq!(err.starter_block_number, 100);
        assert_eq!(err.number_of_blocks, 5);
        assert_eq!(chain.block_number_calls(), 5);
        assert_eq!(handle.phase(), SessionPhase::Rejected);

        // The interval is gone once the session rejected.
        time::sleep(TICK * 10).await;
        assert_eq!(chain.block_number_calls(), 5);
        handle.clean();
    }

    #[tokio::test(start_paused = true)]
    async fn one_block_short_never_rejects() {
        let chain = Arc::new(MockChain::polling([104]));
        let (session, failure) = Session::new(100, 5, None, WatchMode::Polling);
        let handle = spawn(chain, session, TICK);

        assert!(time::timeout(TICK * 120, failure).await.is_err());
        assert_eq!(handle.phase(), SessionPhase::Active);
        handle.clean();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_queries_are_skipped() {
        let chain = Arc::new(MockChain::scripted([
            Step::Fail,
            Step::Height(102),
            Step::Fail,
            Step::Fail,
            Step::Height(105),
        ]));
        let (session, failure) = Session::new(100, 5, None, WatchMode::Polling);
        let handle = spawn(chain.clone(), session, TICK);

        assert_eq!(failure.await.number_of_blocks, 5);
        assert_eq!(chain.block_number_calls(), 5);
        handle.clean();
    }

    #[tokio::test(start_paused = true)]
    async fn jump_past_threshold_reports_actual_elapsed() {
        let chain = Arc::new(MockChain::polling([101, 140]));
        let (session, failure) = Session::new(100, 5, None, WatchMode::Polling);
        let handle = spawn(chain, session, TICK);
        assert_eq!(failure.await.number_of_blocks, 40);
        handle.clean();
    }

    #[tokio::test(start_paused = true)]
    async fn clean_stops_ticking() {
        let chain = Arc::new(MockChain::polling([100]));
        let (session, failure) = Session::new(100, 5, None, WatchMode::Polling);
        let handle = spawn(chain.clone(), session, TICK);

        time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(chain.block_number_calls(), 3);

        handle.clean();
        handle.clean();
        time::sleep(TICK * 30).await;
        assert_eq!(chain.block_number_calls(), 3);
        assert_eq!(handle.phase(), SessionPhase::Cleaned);
        assert!(time::timeout(TICK, failure).await.is_err());
    }
}
