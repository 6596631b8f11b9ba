//! Environment abstraction for deterministic testing.
//!
//! Decouples sync logic from system resources (monotonic time, wall clock).
//! Enables deterministic simulation under a paused tokio clock and production
//! use with real system time.

use std::{future::Future, ops::Sub, time::Duration};

use chrono::{DateTime, Utc};

/// Abstract environment providing time and async sleeping.
///
/// # Invariants
///
/// - `now()` never goes backwards
/// - `wall_clock_millis()` is only used for display timestamps and temporary
///   message ids, never for scheduling
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production uses `tokio::time::Instant`, which the simulation harness
    /// can pause and advance deterministically.
    type Instant: Copy + Ord + Send + Sync + Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code awaits this; state machines take `now` as input.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Milliseconds since the Unix epoch.
    fn wall_clock_millis(&self) -> i64;

    /// Wall clock as a UTC timestamp.
    fn wall_clock(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.wall_clock_millis()).unwrap_or_default()
    }
}

/// Manually advanced environment for state machine tests.
pub mod test_utils {
    use std::{
        future::Future,
        sync::{
            Arc,
            atomic::{AtomicU64, Ordering},
        },
        time::{Duration, Instant},
    };

    use super::Environment;

    /// Wall clock reading of a fresh [`MockEnv`]: 2024-01-01T00:00:00Z.
    pub const MOCK_EPOCH_MILLIS: i64 = 1_704_067_200_000;

    /// Environment whose clock only moves through [`MockEnv::advance`].
    ///
    /// Clones share the clock.
    #[derive(Debug, Clone)]
    pub struct MockEnv {
        base: Instant,
        elapsed_millis: Arc<AtomicU64>,
    }

    impl MockEnv {
        /// Create an environment at [`MOCK_EPOCH_MILLIS`].
        pub fn new() -> Self {
            Self { base: Instant::now(), elapsed_millis: Arc::new(AtomicU64::new(0)) }
        }

        /// Move both clocks forward.
        pub fn advance(&self, by: Duration) {
            let millis = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
            self.elapsed_millis.fetch_add(millis, Ordering::SeqCst);
        }

        fn elapsed(&self) -> Duration {
            Duration::from_millis(self.elapsed_millis.load(Ordering::SeqCst))
        }
    }

    impl Default for MockEnv {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Environment for MockEnv {
        type Instant = Instant;

        fn now(&self) -> Instant {
            self.base + self.elapsed()
        }

        fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
            self.advance(duration);
            std::future::ready(())
        }

        fn wall_clock_millis(&self) -> i64 {
            let elapsed = i64::try_from(self.elapsed().as_millis()).unwrap_or(i64::MAX);
            MOCK_EPOCH_MILLIS.saturating_add(elapsed)
        }
    }

}
