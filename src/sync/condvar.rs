use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::Mutex;

use crate::sync::{Lock, Semaphore, Sleep};
use crate::thread::Thread;

struct Waiter {
    thread: Arc<Thread>,
    sema: Semaphore,
}

/// Condition variable with Mesa semantics.
///
/// A woken waiter competes for the lock again, so the condition may no
/// longer hold when [`wait`](Condvar::wait) returns; check it in a loop.
/// Signals wake the highest-priority waiter first.
///
/// # Examples
/// ```ignore
/// lock.acquire();
/// while !ready() {
///     cond.wait(&lock);
/// }
/// lock.release();
/// ```
#[derive(Default)]
pub struct Condvar {
    waiters: Mutex<Vec<Arc<Waiter>>>,
}

impl Condvar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically release `lock` and wait to be signaled, then reacquire
    /// `lock` before returning. The caller must hold `lock`.
    pub fn wait(&self, lock: &Sleep) {
        let manager = lock.manager();
        assert!(
            !manager.intr.in_context(),
            "condition wait in interrupt context"
        );
        assert!(
            lock.held_by_current_thread(),
            "condition wait without holding lock {}",
            lock.id()
        );

        let waiter = Arc::new(Waiter {
            thread: manager.current(),
            sema: Semaphore::new(manager, 0),
        });
        {
            let _guard = manager.intr.disable();
            let mut waiters = self.waiters.lock();
            let priority = waiter.thread.priority();
            let index = waiters
                .iter()
                .position(|w| w.thread.priority() < priority)
                .unwrap_or(waiters.len());
            waiters.insert(index, waiter.clone());
        }

        lock.release();
        waiter.sema.down();
        lock.acquire();
    }

    /// Wake the highest-priority waiter, if any. The caller must hold `lock`.
    pub fn signal(&self, lock: &Sleep) {
        assert!(
            lock.held_by_current_thread(),
            "condition signal without holding lock {}",
            lock.id()
        );

        let next = {
            let _guard = lock.manager().intr.disable();
            let mut waiters = self.waiters.lock();
            waiters.sort_by(|a, b| b.thread.priority().cmp(&a.thread.priority()));
            (!waiters.is_empty()).then(|| waiters.remove(0))
        };

        if let Some(waiter) = next {
            waiter.sema.up();
        }
    }

    /// Wake every waiter. The caller must hold `lock`.
    pub fn broadcast(&self, lock: &Sleep) {
        while self.has_waiters() {
            self.signal(lock);
        }
    }

    pub fn has_waiters(&self) -> bool {
        !self.waiters.lock().is_empty()
    }

    /// Number of threads waiting to be signaled.
    pub fn waiter_count(&self) -> usize {
        self.waiters.lock().len()
    }
}
