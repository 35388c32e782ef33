//! Per-series bucket state machine.
//!
//! A [`Bucket`] holds the writer for one series and the window it is
//! currently filling. All mutation goes through `&mut self`, and the store
//! keeps each bucket behind its own async mutex, so appends, rebases and the
//! shutdown flush for one series never interleave.
//!
//! Readers never touch the bucket itself. Each bucket publishes its buffered
//! points through a [`WindowView`], a copy-on-write snapshot that can be read
//! while a flush is in progress.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use crate::config::FlushMode;
use crate::error::{Error, Result};
use crate::metrics::{CacheMetrics, FlushTrigger};
use crate::model::{DataPoint, DataPoints, SeriesKey, Value};
use crate::window::BucketClock;
use crate::writer::{Writer, WriterFactory};

/// Acknowledgement that a value was accepted into a bucket's buffer.
///
/// Acceptance does not imply durability: the value is persisted when its
/// window is flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReceipt {
    /// Window the value was buffered in.
    pub window_start: i64,
    /// Window flushed because this write crossed a bucket boundary.
    pub flushed_window: Option<i64>,
}

/// Shared state every bucket needs to create and flush writers.
pub(crate) struct BucketContext {
    pub(crate) clock: BucketClock,
    pub(crate) factory: Arc<dyn WriterFactory>,
    pub(crate) flush_mode: FlushMode,
    pub(crate) flush_timeout: Duration,
    pub(crate) metrics: CacheMetrics,
    /// Fire-and-forget flushes still in flight.
    pub(crate) background: TaskTracker,
}

impl BucketContext {
    pub(crate) fn new_writer(&self, key: &SeriesKey, window_start: i64) -> Result<Box<dyn Writer>> {
        let writer = self
            .factory
            .new_writer(key, window_start)
            .map_err(|source| Error::WriterCreation {
                key: key.to_string(),
                window_start,
                source,
            })?;
        tracing::debug!(series = %key, window_start, "created window writer");
        Ok(writer)
    }

    async fn flush(
        &self,
        writer: &mut dyn Writer,
        key: &SeriesKey,
        window_start: i64,
        trigger: FlushTrigger,
    ) -> Result<()> {
        let to_error = |source| Error::Flush {
            key: key.to_string(),
            window_start,
            source,
        };
        let outcome = match tokio::time::timeout(self.flush_timeout, writer.flush()).await {
            Ok(result) => result.map_err(to_error),
            Err(_) => Err(Error::FlushTimeout {
                key: key.to_string(),
                window_start,
                timeout: self.flush_timeout,
            }),
        };

        self.metrics.record_flush(trigger, outcome.is_ok());
        match &outcome {
            Ok(()) => tracing::debug!(series = %key, window_start, %trigger, "flushed window"),
            Err(e) => {
                tracing::warn!(series = %key, window_start, %trigger, error = %e, "window flush failed")
            }
        }
        outcome
    }

    /// Flushes `writer` on a tracked task once `previous`, the series' prior
    /// background flush, has finished. Windows of one series therefore reach
    /// the backing store in order.
    fn flush_in_background(
        self: &Arc<Self>,
        mut writer: Box<dyn Writer>,
        key: SeriesKey,
        window_start: i64,
        trigger: FlushTrigger,
        previous: Option<JoinHandle<()>>,
    ) -> JoinHandle<()> {
        let ctx = Arc::clone(self);
        self.background.spawn(async move {
            await_background_flush(previous, &key).await;
            if let Err(e) = ctx.flush(writer.as_mut(), &key, window_start, trigger).await {
                ctx.metrics.lost_windows_total.inc();
                tracing::error!(
                    series = %key,
                    window_start,
                    %trigger,
                    error = %e,
                    "background flush failed, window lost"
                );
            }
        })
    }
}

async fn await_background_flush(flush: Option<JoinHandle<()>>, key: &SeriesKey) {
    let Some(flush) = flush else {
        return;
    };
    if let Err(e) = flush.await {
        tracing::error!(series = %key, error = %e, "background flush task failed");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Window {
    Open(i64),
    /// Set by shutdown. Distinct from every real window start.
    Closed,
}

pub(crate) struct Bucket {
    key: SeriesKey,
    window: Window,
    /// Writer for the open window. `None` after a rebase released it or a
    /// replacement could not be created; the next append obtains one.
    writer: Option<Box<dyn Writer>>,
    /// Most recent fire-and-forget flush; the next one waits for it.
    background_flush: Option<JoinHandle<()>>,
    view: Arc<WindowView>,
}

impl Bucket {
    pub(crate) fn new(key: SeriesKey, window_start: i64, writer: Box<dyn Writer>) -> Self {
        let view = Arc::new(WindowView::new(&key, window_start));
        Self {
            key,
            window: Window::Open(window_start),
            writer: Some(writer),
            background_flush: None,
            view,
        }
    }

    pub(crate) fn view(&self) -> Arc<WindowView> {
        Arc::clone(&self.view)
    }

    #[cfg(test)]
    pub(crate) fn window(&self) -> Window {
        self.window
    }

    /// Buffers a value, first flushing the open window if the timestamp
    /// belongs to a different one.
    #[tracing::instrument(level = "debug", skip(self, ctx, value), fields(series = %self.key))]
    pub(crate) async fn append(
        &mut self,
        ctx: &Arc<BucketContext>,
        timestamp: i64,
        value: Value,
    ) -> Result<WriteReceipt> {
        let Window::Open(current) = self.window else {
            return Err(Error::Closed(self.key.to_string()));
        };

        let target = ctx.clock.window_start(timestamp);
        let mut flushed_window = None;
        if target != current {
            if self
                .release_writer(ctx, current, FlushTrigger::Boundary)
                .await?
            {
                flushed_window = Some(current);
            }
            // The window only advances once its replacement writer exists.
            let writer = ctx.new_writer(&self.key, target)?;
            self.writer = Some(writer);
            self.window = Window::Open(target);
            self.view.reset(&self.key, target);
            tracing::debug!(from = current, to = target, "rolled window");
        }

        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => ctx.new_writer(&self.key, target)?,
        };
        let writer = self.writer.insert(writer);

        let point = DataPoint::new(timestamp, value);
        writer.append(point).await.map_err(|source| Error::Append {
            key: self.key.to_string(),
            window_start: target,
            source,
        })?;
        self.view.push(point);
        ctx.metrics.writes_total.inc();

        Ok(WriteReceipt {
            window_start: target,
            flushed_window,
        })
    }

    /// Flushes the open window if it is not `candidate`, then advances to
    /// `candidate` without creating a writer. Returns true if the window
    /// moved.
    pub(crate) async fn persist_if_stale(
        &mut self,
        ctx: &Arc<BucketContext>,
        candidate: i64,
    ) -> Result<bool> {
        let Window::Open(current) = self.window else {
            return Ok(false);
        };
        if current == candidate {
            return Ok(false);
        }

        self.release_writer(ctx, current, FlushTrigger::Rebase)
            .await?;
        self.window = Window::Open(candidate);
        self.view.reset(&self.key, candidate);
        tracing::debug!(series = %self.key, from = current, to = candidate, "rebased window");
        Ok(true)
    }

    /// Flushes whatever is buffered and closes the bucket for good.
    ///
    /// Always waits for the flush, whatever the configured flush mode, and
    /// first waits for any background flush of an earlier window. The bucket
    /// is closed even if the flush fails; the error is returned so the caller
    /// can report the loss.
    ///
    /// A bucket whose writer was already flushed and released by a rebase
    /// has nothing buffered, so no flush call is made for it. It is still
    /// closed, and still counted as shut down.
    pub(crate) async fn shutdown(&mut self, ctx: &BucketContext) -> Result<()> {
        let Window::Open(current) = self.window else {
            return Ok(());
        };
        self.window = Window::Closed;
        self.view.close();
        await_background_flush(self.background_flush.take(), &self.key).await;

        match self.writer.take() {
            Some(mut writer) => {
                ctx.flush(writer.as_mut(), &self.key, current, FlushTrigger::Shutdown)
                    .await
            }
            None => Ok(()),
        }
    }

    /// Flushes and drops the current writer. Returns false if there was no
    /// writer to flush.
    ///
    /// With [`FlushMode::Acknowledged`] a failed flush leaves the writer in
    /// place and returns the error.
    async fn release_writer(
        &mut self,
        ctx: &Arc<BucketContext>,
        window_start: i64,
        trigger: FlushTrigger,
    ) -> Result<bool> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(false);
        };
        match ctx.flush_mode {
            FlushMode::Acknowledged => {
                ctx.flush(&mut **writer, &self.key, window_start, trigger)
                    .await?;
                self.writer = None;
            }
            FlushMode::FireAndForget => {
                if let Some(writer) = self.writer.take() {
                    let previous = self.background_flush.take();
                    self.background_flush = Some(ctx.flush_in_background(
                        writer,
                        self.key.clone(),
                        window_start,
                        trigger,
                        previous,
                    ));
                }
            }
        }
        Ok(true)
    }
}

/// Read-side snapshot of a bucket's buffered window.
pub(crate) struct WindowView {
    current: RwLock<Option<Arc<DataPoints>>>,
}

impl WindowView {
    fn new(key: &SeriesKey, window_start: i64) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(DataPoints::new(key.clone(), window_start)))),
        }
    }

    /// The buffered window, or `None` once the bucket is closed.
    pub(crate) fn snapshot(&self) -> Option<Arc<DataPoints>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, point: DataPoint) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(points) = current.as_mut() {
            // Copies only if a reader still holds the previous snapshot.
            Arc::make_mut(points).push(point);
        }
    }

    fn reset(&self, key: &SeriesKey, window_start: i64) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) =
            Some(Arc::new(DataPoints::new(key.clone(), window_start)));
    }

    fn close(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{RecordingWriterFactory, WriterEvent, context, series};

    fn new_bucket(
        ctx: &Arc<BucketContext>,
        key: &SeriesKey,
        timestamp: i64,
    ) -> Bucket {
        let window_start = ctx.clock.window_start(timestamp);
        let writer = ctx.new_writer(key, window_start).unwrap();
        Bucket::new(key.clone(), window_start, writer)
    }

    fn timestamps(points: &DataPoints) -> Vec<i64> {
        points.iter().map(|p| p.timestamp).collect()
    }

    #[tokio::test]
    async fn should_not_flush_within_same_window() {
        // given
        let factory = RecordingWriterFactory::new();
        let ctx = context(&factory, FlushMode::Acknowledged);
        let key = series("foo", "web01");
        let mut bucket = new_bucket(&ctx, &key, 1000);

        // when
        let first = bucket.append(&ctx, 1000, Value::Integer(1)).await.unwrap();
        let second = bucket.append(&ctx, 2000, Value::Integer(2)).await.unwrap();

        // then
        assert_eq!(first.flushed_window, None);
        assert_eq!(second.flushed_window, None);
        assert!(factory.flushes().is_empty());
        let view = bucket.view().snapshot().unwrap();
        assert_eq!(view.window_start(), 0);
        assert_eq!(timestamps(&view), vec![1000, 2000]);
    }

    #[tokio::test]
    async fn should_flush_old_window_before_buffering_crossing_write() {
        // given
        let factory = RecordingWriterFactory::new();
        let ctx = context(&factory, FlushMode::Acknowledged);
        let key = series("foo", "web01");
        let mut bucket = new_bucket(&ctx, &key, 1000);
        bucket.append(&ctx, 1000, Value::Integer(1)).await.unwrap();
        bucket.append(&ctx, 2000, Value::Integer(2)).await.unwrap();

        // when
        let receipt = bucket.append(&ctx, 4000, Value::Integer(3)).await.unwrap();

        // then
        assert_eq!(
            receipt,
            WriteReceipt {
                window_start: 3600,
                flushed_window: Some(0)
            }
        );
        let name = key.to_string();
        let events = factory.events();
        let flush_at = events
            .iter()
            .position(|e| matches!(e, WriterEvent::Flushed { window_start: 0, .. }))
            .unwrap();
        let append_at = events
            .iter()
            .position(|e| matches!(e, WriterEvent::Appended { point, .. } if point.timestamp == 4000))
            .unwrap();
        assert!(flush_at < append_at);
        assert_eq!(
            factory.flushes(),
            vec![(
                name,
                0,
                vec![DataPoint::new(1000, 1), DataPoint::new(2000, 2)]
            )]
        );
        assert_eq!(bucket.window(), Window::Open(3600));
        assert_eq!(timestamps(&bucket.view().snapshot().unwrap()), vec![4000]);
        assert_eq!(factory.created(), 2);
    }

    #[tokio::test]
    async fn should_treat_millisecond_timestamps_in_same_window() {
        // given
        let factory = RecordingWriterFactory::new();
        let ctx = context(&factory, FlushMode::Acknowledged);
        let key = series("foo", "web01");
        let mut bucket = new_bucket(&ctx, &key, 1388534400);

        // when
        bucket
            .append(&ctx, 1388534400, Value::Integer(1))
            .await
            .unwrap();
        let receipt = bucket
            .append(&ctx, 1388534400500, Value::Float(2.5))
            .await
            .unwrap();

        // then
        assert_eq!(receipt.flushed_window, None);
        assert_eq!(receipt.window_start, 1388534400);
        assert_eq!(bucket.view().snapshot().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn should_keep_window_when_replacement_writer_cannot_be_created() {
        // given
        let factory = RecordingWriterFactory::new();
        let ctx = context(&factory, FlushMode::Acknowledged);
        let key = series("foo", "web01");
        let mut bucket = new_bucket(&ctx, &key, 1000);
        bucket.append(&ctx, 1000, Value::Integer(1)).await.unwrap();
        factory.set_fail_create(true);

        // when
        let result = bucket.append(&ctx, 4000, Value::Integer(3)).await;

        // then
        assert!(matches!(
            result,
            Err(Error::WriterCreation {
                window_start: 3600,
                ..
            })
        ));
        assert_eq!(bucket.window(), Window::Open(0));
        assert_eq!(timestamps(&bucket.view().snapshot().unwrap()), vec![1000]);

        // and the retry succeeds without flushing the old window twice
        factory.set_fail_create(false);
        let receipt = bucket.append(&ctx, 4000, Value::Integer(3)).await.unwrap();
        assert_eq!(receipt.window_start, 3600);
        assert_eq!(receipt.flushed_window, None);
        assert_eq!(factory.flushes().len(), 1);
    }

    #[tokio::test]
    async fn should_retain_window_when_acknowledged_flush_fails() {
        // given
        let factory = RecordingWriterFactory::new();
        let ctx = context(&factory, FlushMode::Acknowledged);
        let key = series("foo", "web01");
        let mut bucket = new_bucket(&ctx, &key, 1000);
        bucket.append(&ctx, 1000, Value::Integer(1)).await.unwrap();
        factory.set_fail_flush(true);

        // when
        let result = bucket.append(&ctx, 4000, Value::Integer(3)).await;

        // then
        assert!(matches!(result, Err(Error::Flush { window_start: 0, .. })));
        assert_eq!(bucket.window(), Window::Open(0));
        assert_eq!(ctx.metrics.flush_failures(FlushTrigger::Boundary), 1);

        // and the buffered data is flushed once the writer recovers
        factory.set_fail_flush(false);
        let receipt = bucket.append(&ctx, 4000, Value::Integer(3)).await.unwrap();
        assert_eq!(receipt.flushed_window, Some(0));
        assert_eq!(
            factory.flushes(),
            vec![(key.to_string(), 0, vec![DataPoint::new(1000, 1)])]
        );
    }

    #[tokio::test]
    async fn should_advance_and_count_lost_window_when_background_flush_fails() {
        // given
        let factory = RecordingWriterFactory::new();
        let ctx = context(&factory, FlushMode::FireAndForget);
        let key = series("foo", "web01");
        let mut bucket = new_bucket(&ctx, &key, 1000);
        bucket.append(&ctx, 1000, Value::Integer(1)).await.unwrap();
        factory.set_fail_flush(true);

        // when
        let receipt = bucket.append(&ctx, 4000, Value::Integer(3)).await.unwrap();
        ctx.background.close();
        ctx.background.wait().await;

        // then
        assert_eq!(receipt.flushed_window, Some(0));
        assert_eq!(bucket.window(), Window::Open(3600));
        assert_eq!(ctx.metrics.lost_windows_total.get(), 1);
        assert!(factory.flushes().is_empty());
    }

    #[tokio::test]
    async fn should_flush_in_background_without_blocking_write() {
        // given
        let factory = RecordingWriterFactory::new();
        let ctx = context(&factory, FlushMode::FireAndForget);
        let key = series("foo", "web01");
        let mut bucket = new_bucket(&ctx, &key, 1000);
        bucket.append(&ctx, 1000, Value::Integer(1)).await.unwrap();
        factory.set_hang_flush(true);

        // when - the flush never completes but the write is still accepted
        let receipt = bucket.append(&ctx, 4000, Value::Integer(3)).await.unwrap();

        // then
        assert_eq!(receipt.window_start, 3600);
        assert_eq!(timestamps(&bucket.view().snapshot().unwrap()), vec![4000]);
        assert_eq!(ctx.background.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_time_out_hung_flush() {
        // given
        let factory = RecordingWriterFactory::new();
        let mut ctx = context(&factory, FlushMode::Acknowledged);
        Arc::get_mut(&mut ctx).unwrap().flush_timeout = Duration::from_secs(5);
        let key = series("foo", "web01");
        let mut bucket = new_bucket(&ctx, &key, 1000);
        bucket.append(&ctx, 1000, Value::Integer(1)).await.unwrap();
        factory.set_hang_flush(true);

        // when
        let result = bucket.append(&ctx, 4000, Value::Integer(3)).await;

        // then
        assert!(matches!(
            result,
            Err(Error::FlushTimeout { window_start: 0, timeout, .. }) if timeout == Duration::from_secs(5)
        ));
        assert_eq!(bucket.window(), Window::Open(0));
    }

    #[tokio::test]
    async fn should_ignore_rebase_to_current_window() {
        // given
        let factory = RecordingWriterFactory::new();
        let ctx = context(&factory, FlushMode::Acknowledged);
        let key = series("foo", "web01");
        let mut bucket = new_bucket(&ctx, &key, 1000);
        bucket.append(&ctx, 1000, Value::Integer(1)).await.unwrap();

        // when
        let moved = bucket.persist_if_stale(&ctx, 0).await.unwrap();

        // then
        assert!(!moved);
        assert!(factory.flushes().is_empty());
    }

    #[tokio::test]
    async fn should_flush_and_advance_stale_window_without_new_writer() {
        // given
        let factory = RecordingWriterFactory::new();
        let ctx = context(&factory, FlushMode::Acknowledged);
        let key = series("foo", "web01");
        let mut bucket = new_bucket(&ctx, &key, 1000);
        bucket.append(&ctx, 1000, Value::Integer(1)).await.unwrap();

        // when
        let moved = bucket.persist_if_stale(&ctx, 3600).await.unwrap();

        // then
        assert!(moved);
        assert_eq!(factory.flushes().len(), 1);
        assert_eq!(factory.created(), 1);
        assert_eq!(bucket.window(), Window::Open(3600));
        assert!(bucket.view().snapshot().unwrap().is_empty());

        // and the next append in the new window opens a fresh writer
        let receipt = bucket.append(&ctx, 4000, Value::Integer(3)).await.unwrap();
        assert_eq!(receipt.flushed_window, None);
        assert_eq!(factory.created(), 2);
    }

    #[tokio::test]
    async fn should_not_double_flush_when_rebase_precedes_boundary_write() {
        // given
        let factory = RecordingWriterFactory::new();
        let ctx = context(&factory, FlushMode::Acknowledged);
        let key = series("foo", "web01");
        let mut bucket = new_bucket(&ctx, &key, 1000);
        bucket.append(&ctx, 1000, Value::Integer(1)).await.unwrap();
        bucket.persist_if_stale(&ctx, 3600).await.unwrap();

        // when - a late write for a later window arrives
        let receipt = bucket.append(&ctx, 7300, Value::Integer(5)).await.unwrap();

        // then
        assert_eq!(receipt.flushed_window, None);
        assert_eq!(receipt.window_start, 7200);
        assert_eq!(factory.flushes().len(), 1);
    }

    #[tokio::test]
    async fn should_flush_empty_writer_once_on_shutdown_and_reject_later_writes() {
        // given
        let factory = RecordingWriterFactory::new();
        let ctx = context(&factory, FlushMode::Acknowledged);
        let key = series("foo", "web01");
        let mut bucket = new_bucket(&ctx, &key, 1000);

        // when
        bucket.shutdown(&ctx).await.unwrap();
        bucket.shutdown(&ctx).await.unwrap();
        let result = bucket.append(&ctx, 1000, Value::Integer(1)).await;

        // then
        assert_eq!(factory.flush_count(&key.to_string()), 1);
        assert_eq!(bucket.window(), Window::Closed);
        assert!(bucket.view().snapshot().is_none());
        assert!(matches!(result, Err(Error::Closed(name)) if name == key.to_string()));
        assert!(!bucket.persist_if_stale(&ctx, 3600).await.unwrap());
    }

    #[tokio::test]
    async fn should_wait_for_shutdown_flush_in_fire_and_forget_mode() {
        // given
        let factory = RecordingWriterFactory::new();
        let ctx = context(&factory, FlushMode::FireAndForget);
        let key = series("foo", "web01");
        let mut bucket = new_bucket(&ctx, &key, 1000);
        bucket.append(&ctx, 1000, Value::Integer(1)).await.unwrap();
        factory.set_fail_flush(true);

        // when
        let result = bucket.shutdown(&ctx).await;

        // then
        assert!(matches!(result, Err(Error::Flush { window_start: 0, .. })));
        assert_eq!(ctx.metrics.flush_failures(FlushTrigger::Shutdown), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_deliver_background_flushes_in_window_order() {
        // given
        let factory = RecordingWriterFactory::new();
        let ctx = context(&factory, FlushMode::FireAndForget);
        let key = series("foo", "web01");
        let mut bucket = new_bucket(&ctx, &key, 1000);
        factory.delay_flush_for_window(0, Duration::from_secs(5));

        // when - window 0 is still flushing when later windows roll over
        bucket.append(&ctx, 1000, Value::Integer(1)).await.unwrap();
        bucket.append(&ctx, 4000, Value::Integer(2)).await.unwrap();
        bucket.append(&ctx, 8000, Value::Integer(3)).await.unwrap();
        bucket.shutdown(&ctx).await.unwrap();

        // then
        let windows: Vec<i64> = factory.flushes().iter().map(|(_, start, _)| *start).collect();
        assert_eq!(windows, vec![0, 3600, 7200]);
    }

    #[tokio::test]
    async fn should_close_without_flushing_when_rebase_already_released_writer() {
        // given
        let factory = RecordingWriterFactory::new();
        let ctx = context(&factory, FlushMode::Acknowledged);
        let key = series("foo", "web01");
        let mut bucket = new_bucket(&ctx, &key, 1000);
        bucket.append(&ctx, 1000, Value::Integer(1)).await.unwrap();
        bucket.persist_if_stale(&ctx, 3600).await.unwrap();

        // when
        let result = bucket.shutdown(&ctx).await;

        // then
        assert!(result.is_ok());
        assert_eq!(factory.flush_count(&key.to_string()), 1);
        assert_eq!(bucket.window(), Window::Closed);
        assert!(bucket.view().snapshot().is_none());
    }

    #[tokio::test]
    async fn should_not_buffer_value_rejected_by_writer() {
        // given
        let factory = RecordingWriterFactory::new();
        let ctx = context(&factory, FlushMode::Acknowledged);
        let key = series("foo", "web01");
        let mut bucket = new_bucket(&ctx, &key, 1000);
        factory.set_fail_append(true);

        // when
        let result = bucket.append(&ctx, 1000, Value::Integer(1)).await;

        // then
        assert!(matches!(result, Err(Error::Append { window_start: 0, .. })));
        assert!(bucket.view().snapshot().unwrap().is_empty());
        assert_eq!(ctx.metrics.writes_total.get(), 0);
    }
}
