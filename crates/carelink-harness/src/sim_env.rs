//! Simulation environment.
//!
//! Monotonic time is tokio's, so a paused runtime advances it
//! deterministically. The wall clock is derived from the same instant: a fixed
//! epoch plus the virtual time elapsed since the environment was created.

use std::time::Duration;

use carelink_core::env::Environment;
use tokio::time::Instant;

/// Wall clock reading of a fresh [`SimEnv`]: 2024-01-01T08:00:00Z.
pub const SIM_EPOCH_MILLIS: i64 = 1_704_096_000_000;

/// Deterministic environment for simulation.
///
/// Clones share the origin, so every component reads the same wall clock.
#[derive(Debug, Clone, Copy)]
pub struct SimEnv {
    origin: Instant,
}

impl SimEnv {
    /// Create an environment whose wall clock starts at [`SIM_EPOCH_MILLIS`].
    ///
    /// Must be called inside a tokio runtime.
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }

    /// Virtual time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        Instant::now() - self.origin
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    type Instant = Instant;

    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn wall_clock_millis(&self) -> i64 {
        let elapsed = i64::try_from(self.elapsed().as_millis()).unwrap_or(i64::MAX);
        SIM_EPOCH_MILLIS.saturating_add(elapsed)
    }
}
