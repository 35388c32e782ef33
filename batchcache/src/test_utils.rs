use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::task::TaskTracker;

use crate::bucket::BucketContext;
use crate::config::FlushMode;
use crate::metrics::CacheMetrics;
use crate::model::{DataPoint, SeriesKey};
use crate::window::BucketClock;
use crate::writer::{Writer, WriterError, WriterFactory, WriterResult};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum WriterEvent {
    Created {
        series: String,
        window_start: i64,
    },
    Appended {
        series: String,
        window_start: i64,
        point: DataPoint,
    },
    Flushed {
        series: String,
        window_start: i64,
        points: Vec<DataPoint>,
    },
}

#[derive(Default)]
struct RecorderState {
    events: Vec<WriterEvent>,
    fail_create: bool,
    fail_append: bool,
    fail_flush: bool,
    fail_flush_for: Option<String>,
    hang_flush: bool,
    hang_flush_for: Option<String>,
    flush_delay: Option<Duration>,
    window_delays: HashMap<i64, Duration>,
}

/// Writer factory that records every call and can be told to fail.
#[derive(Clone, Default)]
pub(crate) struct RecordingWriterFactory {
    state: Arc<Mutex<RecorderState>>,
}

impl RecordingWriterFactory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn events(&self) -> Vec<WriterEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub(crate) fn created(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, WriterEvent::Created { .. }))
            .count()
    }

    /// Successful flushes as `(series, window_start, points)`, in order.
    pub(crate) fn flushes(&self) -> Vec<(String, i64, Vec<DataPoint>)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                WriterEvent::Flushed {
                    series,
                    window_start,
                    points,
                } => Some((series, window_start, points)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn flush_count(&self, series: &str) -> usize {
        self.flushes()
            .iter()
            .filter(|(name, _, _)| name == series)
            .count()
    }

    pub(crate) fn set_fail_create(&self, fail: bool) {
        self.state.lock().unwrap().fail_create = fail;
    }

    pub(crate) fn set_fail_append(&self, fail: bool) {
        self.state.lock().unwrap().fail_append = fail;
    }

    pub(crate) fn set_fail_flush(&self, fail: bool) {
        self.state.lock().unwrap().fail_flush = fail;
    }

    /// Fails flushes for one series only.
    pub(crate) fn fail_flush_for(&self, series: &SeriesKey) {
        self.state.lock().unwrap().fail_flush_for = Some(series.to_string());
    }

    pub(crate) fn set_hang_flush(&self, hang: bool) {
        self.state.lock().unwrap().hang_flush = hang;
    }

    /// Hangs flushes for one series only.
    pub(crate) fn hang_flush_for(&self, series: &SeriesKey) {
        self.state.lock().unwrap().hang_flush_for = Some(series.to_string());
    }

    /// Makes flushes of one window sleep before completing.
    pub(crate) fn delay_flush_for_window(&self, window_start: i64, delay: Duration) {
        self.state
            .lock()
            .unwrap()
            .window_delays
            .insert(window_start, delay);
    }

    /// Makes every flush sleep before completing.
    pub(crate) fn set_flush_delay(&self, delay: Duration) {
        self.state.lock().unwrap().flush_delay = Some(delay);
    }
}

impl WriterFactory for RecordingWriterFactory {
    fn new_writer(&self, key: &SeriesKey, window_start: i64) -> WriterResult<Box<dyn Writer>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_create {
            return Err(WriterError::new("writer factory unavailable"));
        }
        let series = key.to_string();
        state.events.push(WriterEvent::Created {
            series: series.clone(),
            window_start,
        });
        Ok(Box::new(RecordingWriter {
            series,
            window_start,
            pending: Vec::new(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct RecordingWriter {
    series: String,
    window_start: i64,
    pending: Vec<DataPoint>,
    state: Arc<Mutex<RecorderState>>,
}

#[async_trait]
impl Writer for RecordingWriter {
    async fn append(&mut self, point: DataPoint) -> WriterResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_append {
            return Err(WriterError::new("append rejected"));
        }
        self.pending.push(point);
        state.events.push(WriterEvent::Appended {
            series: self.series.clone(),
            window_start: self.window_start,
            point,
        });
        Ok(())
    }

    async fn flush(&mut self) -> WriterResult<()> {
        let (fail, hang, delay) = {
            let state = self.state.lock().unwrap();
            let fail = state.fail_flush || state.fail_flush_for.as_deref() == Some(&self.series);
            let hang =
                state.hang_flush || state.hang_flush_for.as_deref() == Some(&self.series);
            let delay = state
                .window_delays
                .get(&self.window_start)
                .copied()
                .or(state.flush_delay);
            (fail, hang, delay)
        };
        if hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(WriterError::new("backing store unavailable"));
        }
        let points = std::mem::take(&mut self.pending);
        self.state.lock().unwrap().events.push(WriterEvent::Flushed {
            series: self.series.clone(),
            window_start: self.window_start,
            points,
        });
        Ok(())
    }
}

/// Bucket context with hourly buckets and a 30 second flush timeout.
pub(crate) fn context(factory: &RecordingWriterFactory, flush_mode: FlushMode) -> Arc<BucketContext> {
    Arc::new(BucketContext {
        clock: BucketClock::default(),
        factory: Arc::new(factory.clone()),
        flush_mode,
        flush_timeout: Duration::from_secs(30),
        metrics: CacheMetrics::new(),
        background: TaskTracker::new(),
    })
}

pub(crate) fn series(metric: &str, host: &str) -> SeriesKey {
    SeriesKey::new(metric, [("host", host)]).unwrap()
}
