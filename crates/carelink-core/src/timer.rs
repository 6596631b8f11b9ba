//! Cancellable interval timer.
//!
//! Pure bookkeeping: the timer never sleeps. The owner calls
//! [`IntervalTimer::poll`] from its periodic tick and acts when it returns
//! `true`. Generic over `Instant` so virtual time works in tests.

use std::{ops::Sub, time::Duration};

/// Interval that fires once per elapsed period while armed.
#[derive(Debug, Clone)]
pub struct IntervalTimer<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    interval: Duration,
    /// Start of the current period; `None` while disarmed.
    last_fire: Option<I>,
}

impl<I> IntervalTimer<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Create a disarmed timer.
    pub fn new(interval: Duration) -> Self {
        Self { interval, last_fire: None }
    }

    /// Period between firings.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Arm the timer; the first firing is one interval after `now`.
    ///
    /// Returns `false` if it was already armed (the schedule is unchanged).
    pub fn arm(&mut self, now: I) -> bool {
        if self.last_fire.is_some() {
            return false;
        }
        self.last_fire = Some(now);
        true
    }

    /// Disarm the timer. Returns `true` if it was armed.
    pub fn cancel(&mut self) -> bool {
        self.last_fire.take().is_some()
    }

    /// Whether the timer is armed.
    pub fn is_armed(&self) -> bool {
        self.last_fire.is_some()
    }

    /// Returns `true` if a period has elapsed, starting the next one at `now`.
    pub fn poll(&mut self, now: I) -> bool {
        match self.last_fire {
            Some(last) if now >= last && now - last >= self.interval => {
                self.last_fire = Some(now);
                true
            },
            _ => false,
        }
    }
}
