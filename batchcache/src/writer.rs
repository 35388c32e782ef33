//! Seams to the durable backing store.
//!
//! The cache never persists anything itself. Each bucket window is written
//! through a [`Writer`] obtained from the injected [`WriterFactory`], and the
//! writer is responsible for the actual persistent write when flushed.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{DataPoint, SeriesKey};

/// Error reported by a backing writer or writer factory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct WriterError(pub String);

impl WriterError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

pub type WriterResult<T> = std::result::Result<T, WriterError>;

/// Append-only writer scoped to one series and one bucket window.
///
/// A writer is exclusively owned by a single bucket window and is dropped
/// once that window has been flushed.
#[async_trait]
pub trait Writer: Send {
    /// Buffers a data point for this window.
    async fn append(&mut self, point: DataPoint) -> WriterResult<()>;

    /// Persists everything appended so far and finalizes the window.
    ///
    /// Must succeed without side effects when nothing is pending.
    async fn flush(&mut self) -> WriterResult<()>;
}

/// Produces writers for new bucket windows.
///
/// Called while the bucket map is locked for insertion, so implementations
/// must not block.
pub trait WriterFactory: Send + Sync + 'static {
    fn new_writer(&self, key: &SeriesKey, window_start: i64) -> WriterResult<Box<dyn Writer>>;
}
