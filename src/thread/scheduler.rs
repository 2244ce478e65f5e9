//! Ready queue.

pub mod priority;

use alloc::sync::Arc;

use crate::thread::Thread;

/// Basic thread scheduler functionalities.
pub trait Schedule: Default {
    /// Notify the scheduler that a thread is able to run. Then, this thread
    /// becomes a candidate of [`schedule`](Schedule::schedule).
    fn register(&mut self, thread: Arc<Thread>);

    /// Choose the next thread to run. `None` if scheduler decides to keep running
    /// the current thread.
    fn schedule(&mut self) -> Option<Arc<Thread>>;

    /// Move a queued thread to the position of its new priority. Threads that
    /// are not queued are ignored.
    fn change_priority(&mut self, thread: Arc<Thread>, priority: u32);

    /// Priority of the thread [`schedule`](Schedule::schedule) would pick.
    fn highest_priority(&self) -> Option<u32>;

    /// Number of queued threads.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Default scheduler.
pub type Scheduler = self::priority::Priority;
