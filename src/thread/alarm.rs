//! Sleeping threads, keyed by the tick they are due.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::thread::{Queue, Thread};

#[derive(Default)]
pub struct Alarm {
    sleepers: BTreeMap<i64, VecDeque<Arc<Thread>>>,
    len: usize,
}

impl Alarm {
    /// Queue `thread` to be woken at tick `wake_at`. Threads due on the same
    /// tick wake in the order they went to sleep.
    pub fn register(&mut self, thread: Arc<Thread>, wake_at: i64) {
        thread.set_wake_at(wake_at);
        thread.link(Queue::Sleep);
        self.sleepers.entry(wake_at).or_default().push_back(thread);
        self.len += 1;
    }

    /// Remove and return every thread due at or before `now`, earliest first.
    pub fn expire(&mut self, now: i64) -> Vec<Arc<Thread>> {
        let mut due = Vec::new();
        while let Some(entry) = self.sleepers.first_entry() {
            if *entry.key() > now {
                break;
            }
            due.extend(entry.remove());
        }

        for thread in due.iter() {
            thread.unlink(Queue::Sleep);
        }
        self.len -= due.len();
        due
    }

    /// The earliest tick some thread is waiting for.
    pub fn next_wake(&self) -> Option<i64> {
        self.sleepers.keys().next().copied()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
