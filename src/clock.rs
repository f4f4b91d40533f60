//! Monotonic time source used by every time operator and scheduler.
//!
//! Production code uses [`SystemClock`]. Tests drive a [`VirtualClock`]
//! instead so that `debounce`/`sample`/`timeout`/`interval` tests advance
//! time deterministically rather than sleeping wall-clock durations.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// A monotonic time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The real clock, backed by [`std::time::Instant`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Default clock used when an operator's caller does not supply one.
pub fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

/// A clock a test can move forward by hand.
///
/// `VirtualClock::now()` is `base + offset`, where `base` is the real
/// instant the clock was constructed and `offset` only ever grows via
/// [`VirtualClock::advance`]. This lets every timer math in the crate keep
/// using `std::time::Instant` unmodified.
pub struct VirtualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl VirtualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(VirtualClock {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        })
    }

    /// Move the clock forward by `by`. Does not itself wake any scheduler;
    /// pair with `CurrentThreadScheduler::advance`, which calls this and
    /// then drains whatever became due.
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock();
        *offset += by;
    }

    pub fn elapsed(&self) -> Duration {
        *self.offset.lock()
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_clock_advances_monotonically() {
        let clock = VirtualClock::new();
        let t0 = clock.now();
        clock.advance(Duration::from_millis(50));
        let t1 = clock.now();
        assert!(t1 > t0);
        assert_eq!(t1 - t0, Duration::from_millis(50));
    }
}
