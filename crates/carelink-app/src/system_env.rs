//! Production environment.
//!
//! Monotonic time comes from tokio so the same runtime can run under a paused
//! clock; the wall clock comes from the system.

use std::time::Duration;

use carelink_core::env::Environment;

/// Production environment using tokio time and the system clock.
#[derive(Debug, Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn wall_clock_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}
