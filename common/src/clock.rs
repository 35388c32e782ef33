//! Wall-clock sources.
//!
//! Background tasks read the current time through [`Clock`] so tests can
//! substitute a [`MockClock`] and move time by hand.

use std::sync::{PoisonError, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Reads the operating system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct MockClock {
    now: RwLock<SystemTime>,
}

impl Clock for MockClock {
    fn now(&self) -> SystemTime {
        *self.now.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::with_time(SystemTime::now())
    }
}

impl MockClock {
    pub fn with_time(time: SystemTime) -> Self {
        Self {
            now: RwLock::new(time),
        }
    }

    /// Creates a clock reading `secs` seconds after the Unix epoch.
    pub fn at_unix_secs(secs: u64) -> Self {
        Self::with_time(UNIX_EPOCH + Duration::from_secs(secs))
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.write().unwrap_or_else(PoisonError::into_inner);
        *now += duration;
    }

    pub fn set_time(&self, time: SystemTime) {
        *self.now.write().unwrap_or_else(PoisonError::into_inner) = time;
    }

    pub fn set_unix_secs(&self, secs: u64) {
        self.set_time(UNIX_EPOCH + Duration::from_secs(secs));
    }
}
