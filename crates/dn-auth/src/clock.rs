//! Time and sleep abstraction.
//!
//! The failure throttle both reads wall-clock time and blocks the calling
//! thread. Tests substitute [`FakeClock`] so throttle behavior is asserted
//! without real delays.

use std::time::Duration;

use parking_lot::Mutex;

/// Wall-clock time plus the ability to block the calling thread.
pub trait Clock: Send + Sync {
    /// Current time, unix seconds.
    fn now_unix(&self) -> i64;

    /// Blocks the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// System time and `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_secs() as i64)
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Manually advanced clock. Sleeps advance the clock instead of blocking
/// and are recorded for assertion.
#[derive(Debug, Default)]
pub struct FakeClock {
    now: Mutex<i64>,
    slept: Mutex<Vec<Duration>>,
}

impl FakeClock {
    /// Creates a clock reading `now` unix seconds.
    #[must_use]
    pub fn at(now: i64) -> Self {
        Self {
            now: Mutex::new(now),
            slept: Mutex::new(Vec::new()),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, secs: i64) {
        *self.now.lock() += secs;
    }

    /// Every sleep requested so far, in order.
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.slept.lock().clone()
    }
}

impl Clock for FakeClock {
    fn now_unix(&self) -> i64 {
        *self.now.lock()
    }

    fn sleep(&self, duration: Duration) {
        self.slept.lock().push(duration);
        *self.now.lock() += duration.as_secs() as i64;
    }
}
