//! Implementation of kernel threads

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt::{self, Debug};
use core::panic::AssertUnwindSafe;
use core::sync::atomic::{AtomicI32, AtomicI64, AtomicU32, AtomicUsize, Ordering::SeqCst};

use log::debug;
use spin::Mutex;

use crate::error::Result;
use crate::fixed::Fixed;
use crate::mem::Page;
use crate::sync::sleep::LockRecord;
use crate::thread::Manager;

pub const PRI_DEFAULT: u32 = 31;
pub const PRI_MAX: u32 = 63;
pub const PRI_MIN: u32 = 0;
pub const NICE_DEFAULT: i32 = 0;
pub const NICE_MAX: i32 = 20;
pub const NICE_MIN: i32 = -20;
pub const MAGIC: usize = 0xcd6a_bf4b;

/// Thread identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tid(pub u32);

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/* --------------------------------- Thread --------------------------------- */
/// All data of a kernel thread
pub struct Thread {
    tid: Tid,
    name: &'static str,
    /// Sentinel at the bottom of the thread's page.
    magic: AtomicUsize,
    status: Mutex<Status>,
    /// Effective priority, the one the ready queue orders by.
    priority: AtomicU32,
    /// Priority set by the thread itself, never affected by donation.
    base_priority: AtomicU32,
    nice: AtomicI32,
    recent_cpu: Mutex<Fixed>,
    /// Threads waiting on locks held by this thread, in arrival order.
    donors: Mutex<Vec<Arc<Thread>>>,
    /// Lock this thread is waiting to acquire.
    blocking_lock: Mutex<Option<Arc<LockRecord>>>,
    wake_at: AtomicI64,
    queue: Mutex<Queue>,
    page: Mutex<Option<Page>>,
}

impl Thread {
    /// A blocked thread that is not linked anywhere yet.
    pub(crate) fn new(tid: Tid, name: &'static str, priority: u32, page: Page) -> Self {
        assert!(
            (PRI_MIN..=PRI_MAX).contains(&priority),
            "priority {priority} out of range"
        );

        Thread {
            tid,
            name,
            magic: AtomicUsize::new(MAGIC),
            status: Mutex::new(Status::Blocked),
            priority: AtomicU32::new(priority),
            base_priority: AtomicU32::new(priority),
            nice: AtomicI32::new(NICE_DEFAULT),
            recent_cpu: Mutex::new(Fixed::ZERO),
            donors: Mutex::new(Vec::new()),
            blocking_lock: Mutex::new(None),
            wake_at: AtomicI64::new(0),
            queue: Mutex::new(Queue::Unlinked),
            page: Mutex::new(Some(page)),
        }
    }

    pub fn id(&self) -> Tid {
        self.tid
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn status(&self) -> Status {
        *self.status.lock()
    }

    pub(crate) fn set_status(&self, status: Status) {
        *self.status.lock() = status;
    }

    /// Effective priority.
    pub fn priority(&self) -> u32 {
        self.priority.load(SeqCst)
    }

    pub(crate) fn set_priority(&self, priority: u32) {
        self.priority.store(priority, SeqCst);
    }

    pub fn base_priority(&self) -> u32 {
        self.base_priority.load(SeqCst)
    }

    pub(crate) fn set_base_priority(&self, priority: u32) {
        self.base_priority.store(priority, SeqCst);
    }

    pub fn nice(&self) -> i32 {
        self.nice.load(SeqCst)
    }

    pub(crate) fn set_nice(&self, nice: i32) {
        self.nice.store(nice, SeqCst);
    }

    pub fn recent_cpu(&self) -> Fixed {
        *self.recent_cpu.lock()
    }

    pub(crate) fn set_recent_cpu(&self, recent_cpu: Fixed) {
        *self.recent_cpu.lock() = recent_cpu;
    }

    pub fn donors(&self) -> Vec<Arc<Thread>> {
        self.donors.lock().clone()
    }

    /// Record `thread` as a donor. A thread donates at most once.
    pub(crate) fn add_donor(&self, thread: Arc<Thread>) {
        let mut donors = self.donors.lock();
        if !donors.iter().any(|t| Arc::ptr_eq(t, &thread)) {
            donors.push(thread);
        }
    }

    /// Forget every donor that waits on `lock`.
    pub(crate) fn remove_donors(&self, lock: &Arc<LockRecord>) {
        self.donors
            .lock()
            .retain(|thread| !thread.waits_on(lock));
    }

    /// Highest priority among donors.
    pub(crate) fn donated_priority(&self) -> Option<u32> {
        self.donors.lock().iter().map(|t| t.priority()).max()
    }

    pub(crate) fn blocking_lock(&self) -> Option<Arc<LockRecord>> {
        self.blocking_lock.lock().clone()
    }

    pub(crate) fn set_blocking_lock(&self, lock: Option<Arc<LockRecord>>) {
        *self.blocking_lock.lock() = lock;
    }

    pub(crate) fn waits_on(&self, lock: &Arc<LockRecord>) -> bool {
        self.blocking_lock
            .lock()
            .as_ref()
            .is_some_and(|l| Arc::ptr_eq(l, lock))
    }

    /// Tick at which a sleeping thread is due. Meaningless unless the
    /// thread sits on the alarm queue.
    pub fn wake_at(&self) -> i64 {
        self.wake_at.load(SeqCst)
    }

    pub(crate) fn set_wake_at(&self, tick: i64) {
        self.wake_at.store(tick, SeqCst);
    }

    /// The queue currently holding this thread.
    pub fn queue(&self) -> Queue {
        *self.queue.lock()
    }

    /// Put the thread's link into `queue`. A thread is on at most one
    /// queue at a time.
    pub(crate) fn link(&self, queue: Queue) {
        let mut link = self.queue.lock();
        assert_eq!(
            *link,
            Queue::Unlinked,
            "thread {} linked into {:?} while still on {:?}",
            self.tid,
            queue,
            *link
        );
        *link = queue;
    }

    pub(crate) fn unlink(&self, queue: Queue) {
        let mut link = self.queue.lock();
        assert_eq!(
            *link, queue,
            "thread {} unlinked from {:?} while on {:?}",
            self.tid, queue, *link
        );
        *link = Queue::Unlinked;
    }

    /// The stack grew into the control block and destroyed the sentinel.
    pub fn overflow(&self) -> bool {
        self.magic.load(SeqCst) != MAGIC
    }

    #[cfg(test)]
    pub(crate) fn smash_magic(&self) {
        self.magic.store(0, SeqCst);
    }

    /// Give the thread's page back to the pool.
    pub(crate) fn release_page(&self) {
        self.page.lock().take();
    }
}

impl Debug for Thread {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_fmt(format_args!(
            "{}({})[{:?}]",
            self.name(),
            self.id(),
            self.status(),
        ))
    }
}

/* --------------------------------- BUILDER -------------------------------- */
pub struct Builder {
    pub(super) priority: u32,
    pub(super) name: &'static str,
    pub(super) function: Box<dyn FnOnce() + Send>,
}

impl Builder {
    pub fn new<F>(function: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            priority: PRI_DEFAULT,
            name: "Default",
            function: Box::new(function),
        }
    }

    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Spawns a kernel thread and registers it to the [`Manager`].
    ///
    /// If the new thread outranks the caller, the caller yields before
    /// this returns, so the new thread may already have run (or exited).
    pub fn spawn(self, manager: &Arc<Manager>) -> Result<Arc<Thread>> {
        manager.create_thread(self, false)
    }
}

/* --------------------------------- Status --------------------------------- */
/// States of a thread's life cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Not running but ready to run
    Ready,
    /// Currently running
    Running,
    /// Waiting for an event to trigger
    Blocked,
    /// About to be destroyed
    Dying,
}

/* ---------------------------------- Queue --------------------------------- */
/// Which queue a thread's link belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Queue {
    Unlinked,
    /// The scheduler's ready queue.
    Ready,
    /// The alarm queue of sleeping threads.
    Sleep,
    /// A semaphore's wait list.
    Wait,
}

/* --------------------------- Kernel Thread Entry -------------------------- */

/// Unwinding payload used by [`Manager::exit`] to leave the thread's
/// function from any depth.
pub(super) struct Exit;

/// Host-thread body of every kernel thread. Waits for the first switch
/// into the thread, runs `main` with interrupts on, then exits.
pub(super) fn kernel_thread(manager: Arc<Manager>, tid: Tid, main: Box<dyn FnOnce() + Send>) {
    manager.cpu.wait_turn(tid);
    manager.schedule_tail();
    manager.intr.set(true);

    match std::panic::catch_unwind(AssertUnwindSafe(main)) {
        Ok(()) => {}
        Err(payload) if payload.is::<Exit>() => {}
        Err(payload) => {
            debug!("[THREAD] kernel panic in thread {tid}, halting");
            manager.cpu.halt(payload);
            return;
        }
    }

    if manager.cpu.is_halted() {
        return;
    }

    manager.do_exit();
}
