use alloc::sync::Arc;
use core::sync::atomic::{AtomicUsize, Ordering::SeqCst};

use spin::Mutex;

use crate::sync::{Lock, Semaphore};
use crate::thread::donate::Donate;
use crate::thread::{Manager, Thread};

/// Ownership record of a [`Sleep`] lock. Threads blocked on the lock
/// point at it, so the donation engine can walk from a waiter to the
/// holder.
pub struct LockRecord {
    id: usize,
    holder: Mutex<Option<Arc<Thread>>>,
}

impl LockRecord {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn holder(&self) -> Option<Arc<Thread>> {
        self.holder.lock().clone()
    }

    fn set_holder(&self, holder: Option<Arc<Thread>>) {
        *self.holder.lock() = holder;
    }
}

fn generate_id() -> usize {
    static NEXT: AtomicUsize = AtomicUsize::new(1);
    NEXT.fetch_add(1, SeqCst)
}

/// Sleep lock. Uses [`Semaphore`] under the hood.
///
/// Not recursive. In priority mode a thread blocking on the lock donates
/// its priority to the holder, transitively through the holder's own
/// blocking lock.
pub struct Sleep {
    record: Arc<LockRecord>,
    inner: Semaphore,
}

impl Sleep {
    pub fn new(manager: &Arc<Manager>) -> Self {
        Self {
            record: Arc::new(LockRecord {
                id: generate_id(),
                holder: Mutex::new(None),
            }),
            inner: Semaphore::new(manager, 1),
        }
    }

    pub fn id(&self) -> usize {
        self.record.id()
    }

    /// Acquire the lock if it is free, without blocking.
    pub fn try_acquire(&self) -> bool {
        let manager = self.manager();
        let current = manager.current();
        assert!(
            !self.held_by(&current),
            "{:?} acquires lock {} it already holds",
            current,
            self.id()
        );

        let _guard = manager.intr.disable();
        if self.inner.try_down().is_err() {
            return false;
        }
        self.take_ownership(&current);
        true
    }

    pub fn held_by_current_thread(&self) -> bool {
        self.held_by(&self.manager().current())
    }

    pub fn manager(&self) -> &Arc<Manager> {
        self.inner.manager()
    }

    fn held_by(&self, thread: &Arc<Thread>) -> bool {
        self.holder().is_some_and(|h| Arc::ptr_eq(&h, thread))
    }

    /// Interrupts must be off.
    fn take_ownership(&self, current: &Arc<Thread>) {
        self.record.set_holder(Some(current.clone()));
        let manager = self.manager();
        if !manager.config.mlfqs() {
            Donate::adopt_waiters(manager, current, &self.inner.waiters());
        }
    }
}

impl Lock for Sleep {
    fn acquire(&self) {
        let manager = self.manager();
        assert!(
            !manager.intr.in_context(),
            "lock acquired in interrupt context"
        );

        let current = manager.current();
        assert!(
            !self.held_by(&current),
            "{:?} acquires lock {} it already holds",
            current,
            self.id()
        );

        #[cfg(feature = "debug")]
        log::trace!("[LOCK] {:?} acquiring lock {}", current, self.id());

        let donate = !manager.config.mlfqs();
        let _guard = manager.intr.disable();
        self.inner.down_with(|| {
            if !donate {
                return;
            }
            if let Some(holder) = self.record.holder() {
                Donate::add_edge(manager, &current, &holder, &self.record);
            }
        });

        current.set_blocking_lock(None);
        self.take_ownership(&current);
    }

    fn release(&self) {
        let manager = self.manager();
        let current = manager.current();
        assert!(
            self.held_by(&current),
            "{:?} releases lock {} it does not hold",
            current,
            self.id()
        );

        #[cfg(feature = "debug")]
        log::trace!("[LOCK] {:?} releasing lock {}", current, self.id());

        let _guard = manager.intr.disable();
        if !manager.config.mlfqs() {
            Donate::remove_edges(manager, &current, &self.record);
        }
        self.record.set_holder(None);
        self.inner.up();
    }

    fn holder(&self) -> Option<Arc<Thread>> {
        self.record.holder()
    }
}
