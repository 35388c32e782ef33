//! Concurrent map from series key to bucket.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{Mutex, MutexGuard};

use crate::bucket::{Bucket, BucketContext, WindowView, WriteReceipt};
use crate::error::{Error, Result};
use crate::model::{DataPoints, SeriesKey, Value};

/// A bucket plus its lock-free read view.
pub(crate) struct BucketSlot {
    bucket: Mutex<Bucket>,
    view: Arc<WindowView>,
}

impl BucketSlot {
    fn new(bucket: Bucket) -> Self {
        let view = bucket.view();
        Self {
            bucket: Mutex::new(bucket),
            view,
        }
    }

    /// Takes this series' lock. Held across flushes.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, Bucket> {
        self.bucket.lock().await
    }
}

/// All buckets owned by one cache. Entries are added, never removed.
pub(crate) struct BucketStore {
    buckets: DashMap<SeriesKey, Arc<BucketSlot>>,
    ctx: Arc<BucketContext>,
    closed: AtomicBool,
}

impl BucketStore {
    pub(crate) fn new(ctx: Arc<BucketContext>) -> Self {
        Self {
            buckets: DashMap::new(),
            ctx,
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn context(&self) -> &Arc<BucketContext> {
        &self.ctx
    }

    /// Returns the bucket for `key`, creating it for the window containing
    /// `timestamp` on first use.
    ///
    /// Creation happens under the map's shard lock, so concurrent first
    /// writers for a key all receive the same bucket and the writer factory
    /// runs once.
    pub(crate) fn get_or_create(&self, key: &SeriesKey, timestamp: i64) -> Result<Arc<BucketSlot>> {
        if let Some(slot) = self.buckets.get(key) {
            return Ok(Arc::clone(slot.value()));
        }

        match self.buckets.entry(key.clone()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                // Checked under the shard lock so a shutdown sweep that
                // started after close() always sees this insert.
                if self.is_closed() {
                    return Err(Error::Closed(key.to_string()));
                }
                let window_start = self.ctx.clock.window_start(timestamp);
                let writer = self.ctx.new_writer(key, window_start)?;
                let slot = Arc::new(BucketSlot::new(Bucket::new(
                    key.clone(),
                    window_start,
                    writer,
                )));
                self.ctx.metrics.buckets.inc();
                tracing::debug!(series = %key, window_start, "created bucket");
                Ok(Arc::clone(entry.insert(slot).value()))
            }
        }
    }

    /// Appends a value to the bucket for `key`, flushing its previous window
    /// first if the timestamp crosses a boundary.
    pub(crate) async fn write(
        &self,
        key: &SeriesKey,
        timestamp: i64,
        value: Value,
    ) -> Result<WriteReceipt> {
        let slot = self.get_or_create(key, timestamp)?;
        let mut bucket = slot.lock().await;
        bucket.append(&self.ctx, timestamp, value).await
    }

    /// The buffered window for `key`, or `None` if the key has no open
    /// bucket. Never waits on a flush.
    pub(crate) fn read(&self, key: &SeriesKey) -> Option<Arc<DataPoints>> {
        let view = Arc::clone(&self.buckets.get(key)?.view);
        view.snapshot()
    }

    /// The buffered window for `key` if it is the window containing
    /// `timestamp`.
    pub(crate) fn read_at(&self, key: &SeriesKey, timestamp: i64) -> Option<Arc<DataPoints>> {
        let wanted = self.ctx.clock.window_start(timestamp);
        self.read(key).filter(|points| points.window_start() == wanted)
    }

    /// The buffered window for `key` if it lies within the windows spanned by
    /// `start..=end`.
    pub(crate) fn read_range(
        &self,
        key: &SeriesKey,
        start: i64,
        end: i64,
    ) -> Option<Arc<DataPoints>> {
        let first = self.ctx.clock.window_start(start);
        let last = self.ctx.clock.window_start(end);
        self.read(key)
            .filter(|points| (first..=last).contains(&points.window_start()))
    }

    /// Snapshot of every bucket currently in the store. Buckets created after
    /// the snapshot is taken are not included.
    pub(crate) fn entries(&self) -> Vec<Arc<BucketSlot>> {
        self.buckets
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Stops new buckets from being created. Returns false if the store was
    /// already closed.
    pub(crate) fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
