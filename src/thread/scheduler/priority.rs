use alloc::collections::{BTreeMap, VecDeque};
use alloc::sync::Arc;

use crate::thread::{Schedule, Thread, Tid};

/// Priority scheduler: the highest effective priority runs first, equal
/// priorities run in FIFO order.
#[derive(Default)]
pub struct Priority {
    priority_to_thread: BTreeMap<u32, VecDeque<Arc<Thread>>>,
    thread_to_priority: BTreeMap<Tid, u32>, // for O(log n) lookup of current bucket
}

impl Priority {
    #[cfg(feature = "debug")]
    fn dump(&self, op: &str) {
        for (pri, threads) in self.priority_to_thread.iter().rev() {
            for t in threads.iter() {
                log::trace!("[{op}]   tid: {}, priority: {}", t.id(), pri);
            }
        }
    }
}

impl Schedule for Priority {
    fn register(&mut self, thread: Arc<Thread>) {
        let priority = thread.priority();
        let tid = thread.id();

        #[cfg(feature = "debug")]
        {
            log::trace!("[register] tid: {}, priority: {}", tid, priority);
            self.dump("register");
        }

        self.priority_to_thread
            .entry(priority)
            .or_default()
            .push_back(thread);
        self.thread_to_priority.insert(tid, priority);
    }

    fn schedule(&mut self) -> Option<Arc<Thread>> {
        #[cfg(feature = "debug")]
        self.dump("schedule");

        // Find the highest priority bucket
        let mut entry = self.priority_to_thread.last_entry()?;
        let thread = entry.get_mut().pop_front();
        if entry.get().is_empty() {
            entry.remove();
        }

        if let Some(ref t) = thread {
            self.thread_to_priority.remove(&t.id());

            #[cfg(feature = "debug")]
            log::trace!(
                "[schedule] chosen tid: {}, priority: {}",
                t.id(),
                t.priority()
            );
        }

        thread
    }

    fn change_priority(&mut self, thread: Arc<Thread>, priority: u32) {
        let tid = thread.id();
        let Some(old_priority) = self.thread_to_priority.get(&tid).copied() else {
            return;
        };
        if old_priority == priority {
            return;
        }

        if let Some(old_bucket) = self.priority_to_thread.get_mut(&old_priority) {
            if let Some(index) = old_bucket.iter().position(|x| Arc::ptr_eq(x, &thread)) {
                old_bucket.remove(index);
            }
            if old_bucket.is_empty() {
                self.priority_to_thread.remove(&old_priority);
            }
        }

        self.thread_to_priority.insert(tid, priority);
        self.priority_to_thread
            .entry(priority)
            .or_default()
            .push_back(thread);

        #[cfg(feature = "debug")]
        log::trace!(
            "[change_priority] tid: {}, {} -> {}",
            tid,
            old_priority,
            priority
        );
    }

    fn highest_priority(&self) -> Option<u32> {
        self.priority_to_thread.keys().next_back().copied()
    }

    fn len(&self) -> usize {
        self.thread_to_priority.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::PagePool;

    fn thread(pool: &PagePool, tid: u32, priority: u32) -> Arc<Thread> {
        Arc::new(Thread::new(Tid(tid), "test", priority, pool.alloc().unwrap()))
    }

    fn order(scheduler: &mut Priority) -> alloc::vec::Vec<u32> {
        core::iter::from_fn(|| scheduler.schedule())
            .map(|t| t.id().0)
            .collect()
    }

    #[test]
    fn highest_first_then_fifo() {
        let pool = PagePool::new(8);
        let mut scheduler = Priority::default();
        scheduler.register(thread(&pool, 1, 10));
        scheduler.register(thread(&pool, 2, 30));
        scheduler.register(thread(&pool, 3, 10));
        scheduler.register(thread(&pool, 4, 30));

        assert_eq!(scheduler.len(), 4);
        assert_eq!(scheduler.highest_priority(), Some(30));
        assert_eq!(order(&mut scheduler), [2, 4, 1, 3]);
        assert!(scheduler.is_empty());
        assert_eq!(scheduler.highest_priority(), None);
    }

    #[test]
    fn change_priority_moves_to_tail_of_new_level() {
        let pool = PagePool::new(8);
        let mut scheduler = Priority::default();
        let a = thread(&pool, 1, 20);
        scheduler.register(a.clone());
        scheduler.register(thread(&pool, 2, 40));
        scheduler.register(thread(&pool, 3, 20));

        a.set_priority(40);
        scheduler.change_priority(a, 40);

        assert_eq!(order(&mut scheduler), [2, 1, 3]);
    }

    #[test]
    fn change_priority_ignores_unqueued() {
        let pool = PagePool::new(8);
        let mut scheduler = Priority::default();
        scheduler.register(thread(&pool, 1, 20));
        scheduler.change_priority(thread(&pool, 2, 50), 50);

        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.highest_priority(), Some(20));
    }
}
