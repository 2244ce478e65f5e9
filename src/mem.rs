//! Thread page allocator.
//!
//! Every thread owns one page holding its control block and kernel
//! stack. The pool is sized once at boot; running out of pages is the
//! only way thread creation can fail.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicUsize, Ordering::SeqCst};

pub const PG_SIZE: usize = 4096;

struct Pool {
    capacity: usize,
    used: AtomicUsize,
}

/// Fixed-capacity page allocator.
#[derive(Clone)]
pub struct PagePool(Arc<Pool>);

impl PagePool {
    pub fn new(capacity: usize) -> Self {
        Self(Arc::new(Pool {
            capacity,
            used: AtomicUsize::new(0),
        }))
    }

    /// Takes a page, or `None` if the pool is exhausted.
    pub fn alloc(&self) -> Option<Page> {
        self.0
            .used
            .fetch_update(SeqCst, SeqCst, |used| {
                (used < self.0.capacity).then_some(used + 1)
            })
            .ok()
            .map(|_| Page { pool: self.clone() })
    }

    pub fn capacity(&self) -> usize {
        self.0.capacity
    }

    /// Pages currently handed out.
    pub fn in_use(&self) -> usize {
        self.0.used.load(SeqCst)
    }
}

/// An allocated page; returned to its pool when dropped.
pub struct Page {
    pool: PagePool,
}

impl Drop for Page {
    fn drop(&mut self) {
        self.pool.0.used.fetch_sub(1, SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausts_at_capacity() {
        let pool = PagePool::new(2);
        let a = pool.alloc();
        let b = pool.alloc();
        assert!(a.is_some() && b.is_some());
        assert!(pool.alloc().is_none());
        assert_eq!(pool.in_use(), 2);
    }

    #[test]
    fn drop_returns_page() {
        let pool = PagePool::new(1);
        let page = pool.alloc().unwrap();
        assert!(pool.alloc().is_none());
        drop(page);
        assert_eq!(pool.in_use(), 0);
        assert!(pool.alloc().is_some());
    }
}
