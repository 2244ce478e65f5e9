use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::Mutex;

use crate::error::{Error, Result};
use crate::thread::{Manager, Queue, Thread};

/// Atomic counting semaphore
///
/// Waiters are woken highest effective priority first; equal priorities
/// wake in arrival order.
///
/// # Examples
/// ```ignore
/// let sema = Semaphore::new(&manager, 0);
/// sema.up();
/// sema.down();
/// ```
pub struct Semaphore {
    manager: Arc<Manager>,
    value: Mutex<usize>,
    waiters: Mutex<Vec<Arc<Thread>>>,
}

impl Semaphore {
    /// Creates a new semaphore of initial value n.
    pub fn new(manager: &Arc<Manager>, n: usize) -> Self {
        Semaphore {
            manager: manager.clone(),
            value: Mutex::new(n),
            waiters: Mutex::new(Vec::new()),
        }
    }

    /// P operation
    pub fn down(&self) {
        self.down_with(|| {})
    }

    /// P operation, calling `on_wait` with interrupts off each time the
    /// caller is about to block.
    pub(crate) fn down_with(&self, mut on_wait: impl FnMut()) {
        let manager = &self.manager;
        assert!(
            !manager.intr.in_context(),
            "semaphore down in interrupt context"
        );

        let _guard = manager.intr.disable();

        // Is semaphore available?
        while self.value() == 0 {
            on_wait();

            let current = manager.current();
            current.link(Queue::Wait);
            {
                let mut waiters = self.waiters.lock();
                let priority = current.priority();
                let index = waiters
                    .iter()
                    .position(|t| t.priority() < priority)
                    .unwrap_or(waiters.len());
                waiters.insert(index, current);
            }

            // Block the current thread until it's awakened by an `up` operation
            manager.block();
        }
        *self.value.lock() -= 1;
    }

    /// Non-blocking P operation. Fails with [`Error::Busy`] if the value is
    /// zero. Safe inside interrupt handlers.
    pub fn try_down(&self) -> Result<()> {
        let _guard = self.manager.intr.disable();
        let mut value = self.value.lock();
        if *value == 0 {
            return Err(Error::Busy);
        }
        *value -= 1;
        Ok(())
    }

    /// V operation
    ///
    /// Wakes the highest-priority waiter, then yields if it outranks the
    /// caller. Inside an interrupt handler the yield is deferred until the
    /// handler returns.
    pub fn up(&self) {
        let manager = &self.manager;

        {
            let _guard = manager.intr.disable();

            // Priorities may have changed while waiting: re-sort, keeping
            // arrival order among equals.
            let next = {
                let mut waiters = self.waiters.lock();
                waiters.sort_by(|a, b| b.priority().cmp(&a.priority()));
                (!waiters.is_empty()).then(|| waiters.remove(0))
            };

            if let Some(thread) = next {
                thread.unlink(Queue::Wait);
                manager.unblock(&thread);
            }
            *self.value.lock() += 1;
        }

        manager.yield_if_outranked();
    }

    /// Get the current value of a semaphore
    pub fn value(&self) -> usize {
        *self.value.lock()
    }

    /// Threads blocked in [`down`](Semaphore::down), ordered by their
    /// priority when they started waiting.
    pub fn waiters(&self) -> Vec<Arc<Thread>> {
        self.waiters.lock().clone()
    }

    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }
}
