//! Background task that flushes buckets which have gone quiet.
//!
//! A bucket only flushes on its own when a write crosses into a new window.
//! For series that stop receiving writes the rebaser periodically compares
//! every bucket's window with the window containing the current wall-clock
//! time and flushes the ones that differ.

use std::sync::Arc;
use std::time::Duration;

use common::Clock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

use crate::store::BucketStore;

/// Result of one pass over the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SweepOutcome {
    pub(crate) visited: usize,
    pub(crate) rebased: usize,
    pub(crate) failed: usize,
}

/// Flushes every bucket in the store whose window is not `base`.
///
/// Failures are logged and counted per bucket; the sweep always visits every
/// bucket that existed when it started. Each flush is bounded by the flush
/// timeout, so a hung writer delays the sweep by at most that long and counts
/// as a failure.
pub(crate) async fn sweep(store: &BucketStore, base: i64) -> SweepOutcome {
    let ctx = store.context();
    let mut outcome = SweepOutcome::default();
    for slot in store.entries() {
        outcome.visited += 1;
        let mut bucket = slot.lock().await;
        match bucket.persist_if_stale(ctx, base).await {
            Ok(true) => outcome.rebased += 1,
            Ok(false) => {}
            Err(e) => {
                outcome.failed += 1;
                tracing::warn!(window_start = base, error = %e, "failed to rebase bucket");
            }
        }
    }
    outcome
}

pub(crate) struct Rebaser {
    store: Arc<BucketStore>,
    clock: Arc<dyn Clock>,
    interval: Interval,
    stop_tok: CancellationToken,
}

impl Rebaser {
    /// Spawns the rebaser. The first sweep runs one `period` after start.
    pub(crate) fn start(
        store: Arc<BucketStore>,
        clock: Arc<dyn Clock>,
        period: Duration,
    ) -> RebaserHandle {
        let stop_tok = CancellationToken::new();
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let rebaser = Self {
            store,
            clock,
            interval,
            stop_tok: stop_tok.clone(),
        };
        let join = tokio::spawn(rebaser.run());
        tracing::info!(interval = ?period, "started rebaser");
        RebaserHandle {
            stop_tok,
            join: Some(join),
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                _ = self.stop_tok.cancelled() => {
                    break;
                }

                _ = self.interval.tick() => {
                    // Runs to completion; cancellation is only seen between sweeps.
                    let base = self.store.context().clock.window_start_at(self.clock.now());
                    let outcome = sweep(&self.store, base).await;
                    if outcome.failed > 0 {
                        tracing::warn!(
                            window_start = base,
                            visited = outcome.visited,
                            rebased = outcome.rebased,
                            failed = outcome.failed,
                            "rebase sweep finished with failures"
                        );
                    } else {
                        tracing::debug!(
                            window_start = base,
                            visited = outcome.visited,
                            rebased = outcome.rebased,
                            "rebase sweep finished"
                        );
                    }
                }
            }
        }
        tracing::info!("rebaser stopped");
    }
}

/// Handle to a running rebaser. Dropping the handle cancels the task
/// without waiting for it.
pub(crate) struct RebaserHandle {
    stop_tok: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl RebaserHandle {
    /// Cancels the rebaser and waits for it to exit. A sweep already in
    /// progress finishes first. Later calls return immediately.
    pub(crate) async fn stop(&mut self) {
        self.stop_tok.cancel();
        let Some(join) = self.join.take() else {
            return;
        };
        if let Err(e) = join.await {
            tracing::error!(error = %e, "rebaser task failed");
        }
    }
}

impl Drop for RebaserHandle {
    fn drop(&mut self) {
        self.stop_tok.cancel();
    }
}
