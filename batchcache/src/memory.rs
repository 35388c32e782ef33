//! In-memory backing store.
//!
//! Keeps every flushed window in process memory. Used by the ingestion
//! binary and by tests that need a working sink without a real storage
//! engine.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::model::{DataPoint, SeriesKey};
use crate::writer::{Writer, WriterFactory, WriterResult};

/// A window persisted by an [`InMemoryWriter`].
#[derive(Debug, Clone, PartialEq)]
pub struct FlushedWindow {
    pub key: SeriesKey,
    pub window_start: i64,
    pub points: Vec<DataPoint>,
}

/// Factory for writers that persist into a shared in-memory list.
///
/// Cloning the factory shares the underlying storage, so a clone kept by the
/// caller observes everything the cache flushes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWriterFactory {
    flushed: Arc<Mutex<Vec<FlushedWindow>>>,
}

impl InMemoryWriterFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// All flushed windows in flush order.
    pub fn windows(&self) -> Vec<FlushedWindow> {
        self.flushed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Flushed windows for one series, in flush order.
    pub fn windows_for(&self, key: &SeriesKey) -> Vec<FlushedWindow> {
        self.flushed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|w| &w.key == key)
            .cloned()
            .collect()
    }

    /// Total number of points persisted across all windows.
    pub fn point_count(&self) -> usize {
        self.flushed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|w| w.points.len())
            .sum()
    }
}

impl WriterFactory for InMemoryWriterFactory {
    fn new_writer(&self, key: &SeriesKey, window_start: i64) -> WriterResult<Box<dyn Writer>> {
        Ok(Box::new(InMemoryWriter {
            key: key.clone(),
            window_start,
            pending: Vec::new(),
            flushed: Arc::clone(&self.flushed),
        }))
    }
}

/// Writer for one series window. Points become visible in the factory only
/// when flushed.
pub struct InMemoryWriter {
    key: SeriesKey,
    window_start: i64,
    pending: Vec<DataPoint>,
    flushed: Arc<Mutex<Vec<FlushedWindow>>>,
}

#[async_trait]
impl Writer for InMemoryWriter {
    async fn append(&mut self, point: DataPoint) -> WriterResult<()> {
        self.pending.push(point);
        Ok(())
    }

    async fn flush(&mut self) -> WriterResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let points = std::mem::take(&mut self.pending);
        self.flushed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(FlushedWindow {
                key: self.key.clone(),
                window_start: self.window_start,
                points,
            });
        Ok(())
    }
}
