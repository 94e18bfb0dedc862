//! Per-username failure throttle.
//!
//! After a short run of failed verifications for one name the engine
//! starts delaying its responses. The delay is imposed after the table
//! lock is released, so a throttled caller never blocks other requests.
//! A sufficiently long quiet gap between failures clears the record.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::clock::Clock;

/// Failures tolerated before delays begin.
const FREE_FAILURES: u32 = 5;

/// Gap between consecutive failures, in seconds, beyond which the run is
/// considered over and the record is dropped.
const QUIET_WINDOW_SECS: i64 = 120;

struct FailureRun {
    /// Time of the failure before the most recent one.
    previous: i64,
    /// Time of the most recent failure.
    latest: i64,
    count: u32,
}

/// Tracks consecutive verification failures per username and delays the
/// calling thread once a run grows past the free allowance.
pub struct FailureThrottle {
    runs: Mutex<HashMap<String, FailureRun>>,
    clock: Arc<dyn Clock>,
}

impl FailureThrottle {
    /// Creates an empty throttle over `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            runs: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Records one failed verification for `username` and, when the run is
    /// long enough, sleeps for at least `min_delay_secs` (floored at two
    /// seconds) before returning.
    ///
    /// The sleep happens after the table lock is dropped.
    pub fn record_failure(&self, username: &str, min_delay_secs: u64) {
        let now = self.clock.now_unix();
        let must_delay = {
            let mut runs = self.runs.lock();
            match runs.get_mut(username) {
                None => {
                    runs.insert(
                        username.to_string(),
                        FailureRun {
                            previous: now,
                            latest: now,
                            count: 1,
                        },
                    );
                    false
                }
                Some(run) => {
                    run.previous = run.latest;
                    run.latest = now;
                    run.count += 1;
                    if run.count <= FREE_FAILURES {
                        false
                    } else if run.latest - run.previous > QUIET_WINDOW_SECS {
                        // The run went quiet; forget it and charge nothing.
                        runs.remove(username);
                        false
                    } else {
                        true
                    }
                }
            }
        };

        if must_delay {
            let delay = Duration::from_secs(min_delay_secs.max(2));
            debug!(username, delay_secs = delay.as_secs(), "throttling failures");
            self.clock.sleep(delay);
        }
    }

    /// Clears the failure run for `username`, if any.
    pub fn clear(&self, username: &str) {
        self.runs.lock().remove(username);
    }
}
