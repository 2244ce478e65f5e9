//! Synchronization primitives built on the scheduler.

pub mod condvar;
pub mod mutex;
pub mod sema;
pub mod sleep;

pub use self::condvar::Condvar;
pub use self::mutex::{Mutex, MutexGuard};
pub use self::sema::Semaphore;
pub use self::sleep::Sleep;

use alloc::sync::Arc;

use crate::thread::Thread;

/// A mutual-exclusion lock owned by at most one thread at a time.
pub trait Lock {
    /// Acquire the lock, blocking until it is available.
    fn acquire(&self);
    /// Release the lock. The caller must hold it.
    fn release(&self);
    /// The thread holding the lock, if any.
    fn holder(&self) -> Option<Arc<Thread>>;
}
