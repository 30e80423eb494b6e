// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time source abstraction, so scheduler tests can control elapsed time
//! without real sleeps.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// A source of the current time.
///
/// Passed by reference (`&impl Clock`) into anything that needs to read
/// the time, so tests can substitute a fake without threading a generic
/// parameter through the whole call stack.
pub trait Clock: Send + Sync {
    /// Monotonic instant, used for elapsed-time measurement.
    fn now(&self) -> Instant;

    /// Milliseconds since the Unix epoch, used for timestamps that must
    /// survive process restarts (e.g. step history).
    fn epoch_ms(&self) -> u64;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::Clock;
    use parking_lot::Mutex;
    use std::time::Instant;

    /// A clock that only advances when told to. Useful for asserting the
    /// strictly-increasing-mtime behavior of `touch` jobs without sleeping
    /// in tests.
    pub struct FakeClock {
        start: Instant,
        epoch_ms: Mutex<u64>,
    }

    impl FakeClock {
        pub fn new(epoch_ms: u64) -> Self {
            Self {
                start: Instant::now(),
                epoch_ms: Mutex::new(epoch_ms),
            }
        }

        pub fn advance_ms(&self, ms: u64) {
            *self.epoch_ms.lock() += ms;
        }
    }

    impl Default for FakeClock {
        fn default() -> Self {
            Self::new(0)
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            self.start
        }

        fn epoch_ms(&self) -> u64 {
            *self.epoch_ms.lock()
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeClock;

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
