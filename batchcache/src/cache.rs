//! The cache facade owned by the host application.

use std::sync::Arc;

use common::{Clock, SystemClock};
use prometheus_client::registry::Registry;
use tokio_util::task::TaskTracker;

use crate::bucket::{BucketContext, WriteReceipt};
use crate::config::Config;
use crate::error::Result;
use crate::lifecycle::{LifecycleController, ShutdownSummary};
use crate::metrics::CacheMetrics;
use crate::model::{DataPoints, SeriesKey, Value};
use crate::rebaser::Rebaser;
use crate::store::BucketStore;
use crate::writer::WriterFactory;

/// Write-buffering cache for time-bucketed series.
///
/// Values are grouped per series into fixed-width time windows. A window is
/// flushed through its [`Writer`](crate::Writer) when a write for the same
/// series lands in a later window, when the background rebaser finds it
/// stale, or on [`shutdown`](Self::shutdown). The currently buffered window
/// of each series can be read back without touching the backing store.
///
/// Dropping a cache without calling [`shutdown`](Self::shutdown) stops the
/// rebaser but discards anything still buffered.
pub struct BatchCache {
    store: Arc<BucketStore>,
    lifecycle: LifecycleController,
}

impl BatchCache {
    /// Opens a cache that reads wall-clock time from the system clock.
    ///
    /// Must be called from within a Tokio runtime; the rebaser is spawned
    /// immediately.
    pub fn open(config: Config, factory: Arc<dyn WriterFactory>) -> Result<Self> {
        Self::open_with_clock(config, factory, Arc::new(SystemClock))
    }

    /// Opens a cache whose rebaser reads wall-clock time from `clock`.
    pub fn open_with_clock(
        config: Config,
        factory: Arc<dyn WriterFactory>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let bucket_clock = config.validate()?;
        let ctx = Arc::new(BucketContext {
            clock: bucket_clock,
            factory,
            flush_mode: config.flush_mode,
            flush_timeout: config.flush_timeout(),
            metrics: CacheMetrics::new(),
            background: TaskTracker::new(),
        });
        let store = Arc::new(BucketStore::new(ctx));
        let rebaser = Rebaser::start(Arc::clone(&store), clock, config.rebase_interval());
        let lifecycle =
            LifecycleController::new(Arc::clone(&store), rebaser, config.shutdown_concurrency);

        tracing::info!(
            bucket_width = ?config.bucket_width(),
            flush_mode = ?config.flush_mode,
            flush_timeout = ?config.flush_timeout(),
            "opened batch cache"
        );
        Ok(Self { store, lifecycle })
    }

    /// Parses `literal` and buffers it for the series identified by `metric`
    /// and `tags`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedValue`](crate::Error::MalformedValue) or
    /// [`Error::InvalidSeries`](crate::Error::InvalidSeries) without buffering
    /// anything, and otherwise the errors of [`append`](Self::append).
    pub async fn write<I, K, V>(
        &self,
        metric: &str,
        tags: I,
        timestamp: i64,
        literal: &str,
    ) -> Result<WriteReceipt>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let value = Value::parse(literal).inspect_err(|e| {
            self.metrics().malformed_values_total.inc();
            tracing::debug!(metric, timestamp, error = %e, "rejected write");
        })?;
        let key = SeriesKey::new(metric, tags)?;
        self.append(&key, timestamp, value).await
    }

    /// Buffers a typed value for `key`.
    ///
    /// If `timestamp` falls in a later or earlier window than the one the
    /// series is buffering, that window is flushed first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`](crate::Error::Closed) after shutdown, and
    /// writer creation, append or flush errors from the backing store.
    pub async fn append(
        &self,
        key: &SeriesKey,
        timestamp: i64,
        value: impl Into<Value>,
    ) -> Result<WriteReceipt> {
        self.store.write(key, timestamp, value.into()).await
    }

    /// The window currently buffered for `key`, if any.
    pub fn read(&self, key: &SeriesKey) -> Option<Arc<DataPoints>> {
        self.store.read(key)
    }

    /// The buffered window for `key` if it is the window containing
    /// `timestamp`. A miss means the data must come from the backing store.
    pub fn read_at(&self, key: &SeriesKey, timestamp: i64) -> Option<Arc<DataPoints>> {
        self.store.read_at(key, timestamp)
    }

    /// The buffered window for `key` if it falls between the windows
    /// containing `start` and `end`, inclusive.
    pub fn read_range(&self, key: &SeriesKey, start: i64, end: i64) -> Option<Arc<DataPoints>> {
        self.store.read_range(key, start, end)
    }

    /// Stops the rebaser and flushes every buffered window. A call made while
    /// another shutdown is in progress waits for it to finish, then returns an
    /// empty summary, as do all later calls.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shutdown`](crate::Error::Shutdown) listing every
    /// bucket that could not be flushed. All buckets are closed regardless.
    pub async fn shutdown(&self) -> Result<ShutdownSummary> {
        self.lifecycle.shutdown().await
    }

    /// Number of series with a bucket.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.store.is_closed()
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.store.context().metrics
    }

    /// Registers the cache's metrics into `registry`.
    pub fn register_metrics(&self, registry: &mut Registry) {
        self.metrics().register(registry);
    }
}
