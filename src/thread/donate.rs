use alloc::sync::Arc;

use crate::sync::sleep::LockRecord;
use crate::thread::{Manager, Queue, Schedule, Status, Thread};

/// The donation relationships manager for the priority scheduler.
///
/// A thread blocked on a lock is a donor of the lock's holder until the
/// holder releases that lock. A holder's effective priority is the
/// maximum of its base priority and its donors' effective priorities.
pub struct Donate;

impl Donate {
    /// `donor` is about to block on `lock`, currently held by `holder`.
    pub fn add_edge(
        manager: &Manager,
        donor: &Arc<Thread>,
        holder: &Arc<Thread>,
        lock: &Arc<LockRecord>,
    ) {
        donor.set_blocking_lock(Some(lock.clone()));
        holder.add_donor(donor.clone());
        Self::update_donation_chain_priority(manager, lock);
    }

    /// `holder` releases `lock`: every thread waiting on it stops donating.
    pub fn remove_edges(manager: &Manager, holder: &Arc<Thread>, lock: &Arc<LockRecord>) {
        holder.remove_donors(lock);
        Self::update_thread_priority(manager, holder);
    }

    /// `holder` just acquired a lock that other threads still wait on. They
    /// donate to the new holder from now on.
    pub fn adopt_waiters(manager: &Manager, holder: &Arc<Thread>, waiters: &[Arc<Thread>]) {
        if waiters.is_empty() {
            return;
        }
        for waiter in waiters {
            holder.add_donor(waiter.clone());
        }
        Self::update_thread_priority(manager, holder);
    }

    /// Recompute a thread's effective priority from its base priority and
    /// donors. Returns whether it changed.
    pub fn update_thread_priority(manager: &Manager, thread: &Arc<Thread>) -> bool {
        let base = thread.base_priority();
        let priority = thread.donated_priority().map_or(base, |p| p.max(base));
        if priority == thread.priority() {
            return false;
        }

        #[cfg(feature = "debug")]
        log::trace!("[DONATE] {:?}: {} -> {}", thread, thread.priority(), priority);

        thread.set_priority(priority);
        if thread.status() == Status::Ready && thread.queue() == Queue::Ready {
            manager
                .scheduler
                .lock()
                .change_priority(thread.clone(), priority);
        }
        true
    }

    /// Walk the wait-for chain starting at `lock`'s holder, refreshing one
    /// holder per step. Stops at an unchanged priority, at a running holder
    /// or after the configured depth.
    pub fn update_donation_chain_priority(manager: &Manager, lock: &Arc<LockRecord>) {
        let mut lock = Some(lock.clone());

        for _ in 0..manager.config.donation_depth {
            let Some(holder) = lock.take().and_then(|l| l.holder()) else {
                return;
            };
            if !Self::update_thread_priority(manager, &holder) {
                return;
            }
            lock = holder.blocking_lock();
        }
    }
}
