//! Prometheus metrics for the batch cache.

use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

/// What caused a window to be flushed.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum FlushTrigger {
    /// A write crossed into a new bucket.
    Boundary,
    /// The rebaser found the bucket stale.
    Rebase,
    /// The cache is shutting down.
    Shutdown,
}

impl std::fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlushTrigger::Boundary => write!(f, "boundary"),
            FlushTrigger::Rebase => write!(f, "rebase"),
            FlushTrigger::Shutdown => write!(f, "shutdown"),
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct FlushLabels {
    pub trigger: FlushTrigger,
}

/// Container for all cache metrics.
///
/// Metric handles are cheap to clone; the cache keeps one set and callers
/// register it into their own [`Registry`].
#[derive(Clone, Debug, Default)]
pub struct CacheMetrics {
    /// Data points accepted into a bucket.
    pub writes_total: Counter,

    /// Writes rejected because the value text was malformed.
    pub malformed_values_total: Counter,

    /// Windows flushed successfully, by trigger.
    pub flushes_total: Family<FlushLabels, Counter>,

    /// Window flushes that failed or timed out, by trigger.
    pub flush_failures_total: Family<FlushLabels, Counter>,

    /// Windows dropped after a fire-and-forget flush failed.
    pub lost_windows_total: Counter,

    /// Buckets currently held by the store.
    pub buckets: Gauge,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every cache metric under the `batchcache` prefix.
    pub fn register(&self, registry: &mut Registry) {
        let registry = registry.sub_registry_with_prefix("batchcache");
        registry.register(
            "writes",
            "Total number of data points buffered",
            self.writes_total.clone(),
        );
        registry.register(
            "malformed_values",
            "Total number of writes rejected for malformed values",
            self.malformed_values_total.clone(),
        );
        registry.register(
            "flushes",
            "Total number of windows flushed to the backing store",
            self.flushes_total.clone(),
        );
        registry.register(
            "flush_failures",
            "Total number of window flushes that failed or timed out",
            self.flush_failures_total.clone(),
        );
        registry.register(
            "lost_windows",
            "Total number of windows dropped after a background flush failed",
            self.lost_windows_total.clone(),
        );
        registry.register(
            "buckets",
            "Number of series buckets held in memory",
            self.buckets.clone(),
        );
    }

    pub(crate) fn record_flush(&self, trigger: FlushTrigger, ok: bool) {
        let labels = FlushLabels { trigger };
        if ok {
            self.flushes_total.get_or_create(&labels).inc();
        } else {
            self.flush_failures_total.get_or_create(&labels).inc();
        }
    }

    /// Successful flushes so far for `trigger`.
    pub fn flushes(&self, trigger: FlushTrigger) -> u64 {
        self.flushes_total
            .get_or_create(&FlushLabels { trigger })
            .get()
    }

    pub fn flush_failures(&self, trigger: FlushTrigger) -> u64 {
        self.flush_failures_total
            .get_or_create(&FlushLabels { trigger })
            .get()
    }
}
