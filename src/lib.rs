//! Thread scheduling and synchronization core of a single-CPU kernel,
//! running on a hosted machine.
//!
//! [`Manager::boot`] turns the calling host thread into the kernel's
//! initial thread. Every kernel thread is backed by a host thread, but only
//! the one owning the simulated CPU executes at any time; all others are
//! parked in the context switch. Time advances only through timer
//! interrupts, raised by [`Manager::timer_interrupt`] or by the idle
//! thread when every other thread is asleep.

extern crate alloc;

pub mod config;
pub mod error;
pub mod fixed;
pub mod mem;
pub mod sbi;
pub mod sync;
pub mod thread;

pub use crate::config::{Config, Policy};
pub use crate::error::{Error, Result};
pub use crate::fixed::Fixed;
pub use crate::sync::{Condvar, Lock, Mutex, MutexGuard, Semaphore, Sleep};
pub use crate::thread::{
    Builder, Manager, Queue, Stats, Status, Thread, Tid, NICE_MAX, NICE_MIN, PRI_DEFAULT, PRI_MAX,
    PRI_MIN,
};
