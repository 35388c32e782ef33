//! Time bucketing.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};

/// A timestamp with any of these bits set is in milliseconds.
const SECONDS_MASK: u64 = 0xFFFF_FFFF_0000_0000;

/// Default bucket width: one hour.
pub const DEFAULT_BUCKET_WIDTH: Duration = Duration::from_secs(3600);

/// Returns true if the timestamp is in milliseconds rather than seconds.
///
/// Second-resolution timestamps fit in the low 32 bits; anything larger
/// (and every negative value) is treated as milliseconds.
pub fn is_millis(timestamp: i64) -> bool {
    (timestamp as u64) & SECONDS_MASK != 0
}

/// Normalizes a second or millisecond timestamp to seconds, flooring.
pub fn to_seconds(timestamp: i64) -> i64 {
    if is_millis(timestamp) {
        timestamp.div_euclid(1000)
    } else {
        timestamp
    }
}

/// Maps timestamps onto the start of their fixed-width bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketClock {
    width_secs: i64,
}

impl Default for BucketClock {
    fn default() -> Self {
        Self {
            width_secs: DEFAULT_BUCKET_WIDTH.as_secs() as i64,
        }
    }
}

impl BucketClock {
    /// Creates a clock with the given bucket width.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] unless the width is a positive whole
    /// number of seconds.
    pub fn new(width: Duration) -> Result<Self> {
        if width.subsec_nanos() != 0 || width.as_secs() == 0 {
            return Err(Error::InvalidConfig(format!(
                "bucket width must be a positive whole number of seconds, got {:?}",
                width
            )));
        }
        let width_secs = i64::try_from(width.as_secs())
            .map_err(|_| Error::InvalidConfig(format!("bucket width {:?} is too large", width)))?;
        Ok(Self { width_secs })
    }

    pub fn width(&self) -> Duration {
        Duration::from_secs(self.width_secs as u64)
    }

    /// Start, in seconds, of the bucket containing `timestamp`.
    pub fn window_start(&self, timestamp: i64) -> i64 {
        self.floor(to_seconds(timestamp))
    }

    /// Start, in seconds, of the bucket containing a wall-clock instant.
    pub fn window_start_at(&self, time: SystemTime) -> i64 {
        let secs = match time.duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_secs() as i64,
            Err(before) => -(before.duration().as_secs_f64().ceil() as i64),
        };
        self.floor(secs)
    }

    fn floor(&self, secs: i64) -> i64 {
        secs.div_euclid(self.width_secs) * self.width_secs
    }
}
