//! Orderly shutdown of a cache.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::rebaser::RebaserHandle;
use crate::store::BucketStore;

/// Outcome of a successful shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownSummary {
    /// Buckets closed by this shutdown. Each was flushed once, except a
    /// bucket whose window a rebase had already flushed and which had
    /// received nothing since.
    pub buckets: usize,
}

pub(crate) struct LifecycleController {
    store: Arc<BucketStore>,
    rebaser: Mutex<RebaserHandle>,
    concurrency: usize,
}

impl LifecycleController {
    pub(crate) fn new(store: Arc<BucketStore>, rebaser: RebaserHandle, concurrency: usize) -> Self {
        Self {
            store,
            rebaser: Mutex::new(rebaser),
            concurrency,
        }
    }

    /// Closes the store, stops the rebaser and flushes every bucket once.
    ///
    /// Only the first call does any work. A call made while that shutdown is
    /// still running waits for it to finish; every later call returns an
    /// empty summary.
    pub(crate) async fn shutdown(&self) -> Result<ShutdownSummary> {
        // Held until the flushes are done, so concurrent callers queue here.
        let mut rebaser = self.rebaser.lock().await;
        if !self.store.close() {
            tracing::debug!("cache already shut down");
            return Ok(ShutdownSummary::default());
        }

        tracing::info!(buckets = self.store.len(), "shutting down cache");
        rebaser.stop().await;

        let ctx = Arc::clone(self.store.context());
        let slots = self.store.entries();
        let buckets = slots.len();
        let failures: Vec<Error> = stream::iter(slots)
            .map(|slot| {
                let ctx = Arc::clone(&ctx);
                async move { slot.lock().await.shutdown(&ctx).await }
            })
            .buffer_unordered(self.concurrency)
            .filter_map(|result| async move { result.err() })
            .collect()
            .await;

        // Background flushes from before the sweep must land before we report.
        ctx.background.close();
        ctx.background.wait().await;

        if failures.is_empty() {
            tracing::info!(buckets, "cache shut down");
            Ok(ShutdownSummary { buckets })
        } else {
            tracing::error!(
                buckets,
                failed = failures.len(),
                "cache shut down with unflushed buckets"
            );
            Err(Error::Shutdown { failures, buckets })
        }
    }
}
