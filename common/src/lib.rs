//! Shared utilities for the batchcache workspace.

pub mod clock;

pub use clock::{Clock, MockClock, SystemClock};
