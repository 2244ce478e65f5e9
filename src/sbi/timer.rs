//! Tick source.

use core::sync::atomic::{AtomicI64, Ordering::SeqCst};

/// Monotonic count of timer interrupts since boot.
#[derive(Default)]
pub struct Timer {
    ticks: AtomicI64,
}

impl Timer {
    pub const fn new() -> Self {
        Self {
            ticks: AtomicI64::new(0),
        }
    }

    /// Ticks since boot.
    pub fn timer_ticks(&self) -> i64 {
        self.ticks.load(SeqCst)
    }

    /// Ticks elapsed since `then`, a value returned by [`timer_ticks`](Self::timer_ticks).
    pub fn timer_elapsed(&self, then: i64) -> i64 {
        self.timer_ticks() - then
    }

    /// Count one more tick and return the new total.
    pub(crate) fn advance(&self) -> i64 {
        self.ticks.fetch_add(1, SeqCst) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_and_elapsed() {
        let timer = Timer::new();
        assert_eq!(timer.timer_ticks(), 0);
        assert_eq!(timer.advance(), 1);
        assert_eq!(timer.advance(), 2);
        assert_eq!(timer.timer_elapsed(1), 1);
    }
}
