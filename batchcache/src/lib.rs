//! batchcache - a write-buffering cache for time-bucketed series.
//!
//! Writes for a series are grouped into fixed-width time windows (one hour by
//! default) and held in memory until the window is known to be complete.
//! A window is complete when a write for the same series lands in a different
//! window, when a background sweep finds the series has gone quiet, or when
//! the cache shuts down. Complete windows are flushed through an injected
//! [`Writer`], which owns the actual persistent write.
//!
//! The window currently being buffered can be read back at any time. A read
//! that asks for a different window misses, and the caller should go to the
//! backing store instead.
//!
//! # Key Concepts
//!
//! - **BatchCache**: the process-scoped entry point providing writes, reads
//!   and shutdown.
//! - **SeriesKey**: a metric name plus its tags; tag order does not matter.
//! - **BucketClock**: maps second or millisecond timestamps onto window
//!   starts.
//! - **WriterFactory**: creates one [`Writer`] per series window.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use batchcache::{BatchCache, Config, InMemoryWriterFactory, SeriesKey};
//!
//! #[tokio::main]
//! async fn main() -> batchcache::Result<()> {
//!     let cache = BatchCache::open(Config::default(), Arc::new(InMemoryWriterFactory::new()))?;
//!
//!     cache.write("sys.cpu.user", [("host", "web01")], 1000, "42").await?;
//!
//!     let key = SeriesKey::new("sys.cpu.user", [("host", "web01")])?;
//!     assert!(cache.read_at(&key, 2000).is_some());
//!
//!     cache.shutdown().await?;
//!     Ok(())
//! }
//! ```

// Internal modules
mod bucket;
mod lifecycle;
mod rebaser;
mod store;
#[cfg(test)]
mod test_utils;

// Public API modules
mod cache;
mod config;
mod error;
mod ingest;
mod memory;
mod metrics;
mod model;
mod window;
mod writer;

// Public re-exports
pub use bucket::WriteReceipt;
pub use cache::BatchCache;
pub use config::{CliArgs, Config, FlushMode, load_config};
pub use error::{Error, Result};
pub use ingest::{PutLine, is_ignorable};
pub use lifecycle::ShutdownSummary;
pub use memory::{FlushedWindow, InMemoryWriter, InMemoryWriterFactory};
pub use metrics::{CacheMetrics, FlushLabels, FlushTrigger};
pub use model::{DataPoint, DataPoints, SeriesKey, Value};
pub use window::{BucketClock, DEFAULT_BUCKET_WIDTH, is_millis, to_seconds};
pub use writer::{Writer, WriterError, WriterFactory, WriterResult};
