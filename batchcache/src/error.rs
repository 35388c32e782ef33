//! Error types for cache operations.

use std::time::Duration;

use thiserror::Error;

use crate::writer::WriterError;

/// Errors returned by [`BatchCache`](crate::BatchCache) operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The literal value text is neither an integer nor a finite float.
    #[error("malformed value '{0}': expected an integer or a floating-point number")]
    MalformedValue(String),

    /// The metric name or tag set cannot form a series key.
    #[error("invalid series: {0}")]
    InvalidSeries(String),

    /// An ingestion line could not be parsed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The writer factory could not produce a writer for a window.
    #[error("failed to create writer for {key} @ {window_start}: {source}")]
    WriterCreation {
        key: String,
        window_start: i64,
        #[source]
        source: WriterError,
    },

    /// The backing writer refused a data point.
    #[error("failed to append to {key} @ {window_start}: {source}")]
    Append {
        key: String,
        window_start: i64,
        #[source]
        source: WriterError,
    },

    /// The backing writer failed to persist a window.
    #[error("failed to flush {key} @ {window_start}: {source}")]
    Flush {
        key: String,
        window_start: i64,
        #[source]
        source: WriterError,
    },

    #[error("flush of {key} @ {window_start} timed out after {timeout:?}")]
    FlushTimeout {
        key: String,
        window_start: i64,
        timeout: Duration,
    },

    /// A write arrived after the cache was shut down.
    #[error("write to {0} after shutdown")]
    Closed(String),

    /// One or more buckets could not be flushed during shutdown.
    #[error("shutdown failed to flush {} of {buckets} bucket(s)", .failures.len())]
    Shutdown { failures: Vec<Error>, buckets: usize },
}

impl Error {
    /// Returns true for errors raised by the backing writer while persisting.
    pub fn is_flush_failure(&self) -> bool {
        matches!(self, Error::Flush { .. } | Error::FlushTimeout { .. })
    }
}

/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;
