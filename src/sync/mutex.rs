use alloc::sync::Arc;
use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};

use crate::sync::{Lock, Sleep};
use crate::thread::Manager;

/// Data protected by a [`Sleep`] lock.
pub struct Mutex<T> {
    lock: Sleep,
    data: UnsafeCell<T>,
}

// SAFETY: the sleep lock serializes every access to `data`.
unsafe impl<T: Send> Send for Mutex<T> {}
unsafe impl<T: Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    pub fn new(manager: &Arc<Manager>, value: T) -> Self {
        Self {
            lock: Sleep::new(manager),
            data: UnsafeCell::new(value),
        }
    }

    /// Block until the lock is ours. The lock is released when the guard drops.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.lock.acquire();
        MutexGuard { mutex: self }
    }

    /// The underlying lock, for use with a [`Condvar`](crate::sync::Condvar).
    pub fn raw(&self) -> &Sleep {
        &self.lock
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

pub struct MutexGuard<'a, T> {
    mutex: &'a Mutex<T>,
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard proves the lock is held.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard proves the lock is held.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.lock.release();
    }
}
