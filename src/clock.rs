//! Injectable time source.
//!
//! The dispatcher's grace delay and the poll loop's deadline/interval
//! logic run against this trait so tests can simulate round progression
//! without real elapsed time.

use std::time::{Duration, Instant};

/// Monotonic clock with an async sleep.
#[allow(async_fn_in_trait)]
pub trait Clock {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

/// The real clock, backed by `Instant` and `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::cell::Cell;

    /// Test clock that advances instantly on sleep.
    pub struct ManualClock {
        base: Instant,
        elapsed: Cell<Duration>,
        slept: Cell<Duration>,
    }

    impl ManualClock {
        pub fn new() -> Self {
            Self {
                base: Instant::now(),
                elapsed: Cell::new(Duration::ZERO),
                slept: Cell::new(Duration::ZERO),
            }
        }

        /// Total time spent in `sleep` calls.
        pub fn total_slept(&self) -> Duration {
            self.slept.get()
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.base + self.elapsed.get()
        }

        async fn sleep(&self, duration: Duration) {
            self.elapsed.set(self.elapsed.get() + duration);
            self.slept.set(self.slept.get() + duration);
        }
    }
}
