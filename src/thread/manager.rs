//! Manager of all kernel threads.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, AtomicU64, Ordering::SeqCst};

use log::{debug, info};
use spin::Mutex;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fixed::Fixed;
use crate::mem::PagePool;
use crate::sbi::interrupt::Interrupt;
use crate::sbi::timer::Timer;
use crate::sync::Semaphore;
use crate::thread::alarm::Alarm;
use crate::thread::imp::kernel_thread;
use crate::thread::mlfqs;
use crate::thread::switch::Cpu;
use crate::thread::{Builder, Queue, Schedule, Scheduler, Status, Thread, Tid, PRI_MIN};

/// Called with the exiting thread before it is descheduled for good.
pub type ExitHook = Arc<dyn Fn(&Arc<Thread>) + Send + Sync>;

/// Tick accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Ticks spent in the idle thread.
    pub idle_ticks: u64,
    /// Ticks spent in any other thread.
    pub kernel_ticks: u64,
}

/// Global kernel state: the CPU, the interrupt controller, the timer and
/// every queue the scheduler owns.
pub struct Manager {
    pub(crate) config: Config,
    pub(crate) intr: Interrupt,
    pub(crate) timer: Timer,
    pub(super) cpu: Cpu,
    pages: PagePool,
    next_tid: AtomicU32,

    /// The running thread.
    pub(super) current: Mutex<Arc<Thread>>,
    /// Thread switched away from, until the incoming thread finishes the switch.
    prev: Mutex<Option<Arc<Thread>>>,
    pub(super) initial: Arc<Thread>,
    pub(super) idle: Mutex<Option<Arc<Thread>>>,

    pub(super) scheduler: Mutex<Scheduler>,
    /// Every live thread.
    pub(super) all: Mutex<Vec<Arc<Thread>>>,
    pub(super) alarm: Mutex<Alarm>,

    /// Ticks the running thread has had since it was switched in.
    pub(super) slice: AtomicU32,
    pub(super) load_avg: Mutex<Fixed>,
    idle_ticks: AtomicU64,
    kernel_ticks: AtomicU64,
    exit_hook: Mutex<Option<ExitHook>>,
}

impl Manager {
    /// Boot the threading system.
    ///
    /// The caller's host thread becomes the initial thread `main`, running
    /// at [`PRI_DEFAULT`](crate::thread::PRI_DEFAULT) (or at the top decay
    /// priority in MLFQS mode). The idle thread is created and has run once
    /// before this returns, and interrupts are enabled.
    pub fn boot(config: Config) -> Result<Arc<Self>> {
        if config.max_threads < 2 {
            return Err(Error::InvalidConfig(format!(
                "-threads={}",
                config.max_threads
            )));
        }

        let pages = PagePool::new(config.max_threads);
        let page = pages.alloc().ok_or(Error::OutOfMemory)?;
        let tid = Tid(1);
        let initial = Arc::new(Thread::new(tid, "main", crate::thread::PRI_DEFAULT, page));
        if config.mlfqs() {
            initial.set_priority(mlfqs::calc_priority(Fixed::ZERO, 0));
        }
        initial.set_status(Status::Running);

        info!("[THREAD] booting with {:?}", config);

        let manager = Arc::new(Manager {
            intr: Interrupt::new(),
            timer: Timer::new(),
            cpu: Cpu::new(tid),
            pages,
            next_tid: AtomicU32::new(tid.0 + 1),
            current: Mutex::new(initial.clone()),
            prev: Mutex::new(None),
            initial: initial.clone(),
            idle: Mutex::new(None),
            scheduler: Mutex::new(Scheduler::default()),
            all: Mutex::new(alloc::vec![initial]),
            alarm: Mutex::new(Alarm::default()),
            slice: AtomicU32::new(0),
            load_avg: Mutex::new(Fixed::ZERO),
            idle_ticks: AtomicU64::new(0),
            kernel_ticks: AtomicU64::new(0),
            exit_hook: Mutex::new(None),
            config,
        });

        // Start the idle thread and wait for it to settle.
        let started = Arc::new(Semaphore::new(&manager, 0));
        let idle = {
            let (manager, started) = (manager.clone(), started.clone());
            Builder::new(move || manager.idle_loop(&started))
                .name("idle")
                .priority(PRI_MIN)
        };
        manager.create_thread(idle, true)?;

        manager.intr.set(true);
        started.down();

        Ok(manager)
    }

    /// Allocate, register and start a new thread.
    pub(super) fn create_thread(self: &Arc<Self>, builder: Builder, idle: bool) -> Result<Arc<Thread>> {
        let Builder {
            priority,
            name,
            function,
        } = builder;

        let page = self.pages.alloc().ok_or(Error::OutOfMemory)?;
        let tid = Tid(self.next_tid.fetch_add(1, SeqCst));
        let thread = Arc::new(Thread::new(tid, name, priority, page));

        let parent = self.running();
        thread.set_nice(parent.nice());
        thread.set_recent_cpu(parent.recent_cpu());
        if self.config.mlfqs() && !idle {
            thread.set_priority(mlfqs::calc_priority(thread.recent_cpu(), thread.nice()));
        }

        let manager = self.clone();
        std::thread::Builder::new()
            .name(format!("{name}-{tid}"))
            .spawn(move || kernel_thread(manager, tid, function))?;

        debug!("[THREAD] create {:?} with priority {}", thread, thread.priority());

        {
            let _guard = self.intr.disable();
            if idle {
                *self.idle.lock() = Some(thread.clone());
            }
            self.all.lock().push(thread.clone());
            self.unblock(&thread);
        }

        if !idle && thread.priority() > self.running().priority() {
            self.yield_now();
        }

        Ok(thread)
    }

    /// The thread that owns the CPU, without sanity checks.
    pub(super) fn running(&self) -> Arc<Thread> {
        self.current.lock().clone()
    }

    pub(crate) fn is_idle(&self, thread: &Arc<Thread>) -> bool {
        self.idle
            .lock()
            .as_ref()
            .is_some_and(|idle| Arc::ptr_eq(idle, thread))
    }

    /// Snapshot of every live thread.
    pub(super) fn threads(&self) -> Vec<Arc<Thread>> {
        self.all.lock().clone()
    }

    /// Put a thread into the ready queue.
    pub(super) fn register(&self, thread: Arc<Thread>) {
        thread.link(Queue::Ready);
        self.scheduler.lock().register(thread);
    }

    /// Whether some ready thread should take the CPU from the running one.
    pub(super) fn outranked(&self) -> bool {
        let current = self.running();
        let highest = self.scheduler.lock().highest_priority();
        match highest {
            None => false,
            Some(highest) => self.is_idle(&current) || highest > current.priority(),
        }
    }

    /// Yield if a ready thread outranks the running one. Inside an
    /// interrupt handler the yield happens when the handler returns.
    pub(crate) fn yield_if_outranked(&self) {
        let outranked = {
            let _guard = self.intr.disable();
            self.outranked()
        };
        if !outranked {
            return;
        }

        if self.intr.in_context() {
            self.intr.yield_on_return();
        } else {
            self.yield_now();
        }
    }

    /// Choose the next thread and switch to it. The running thread must
    /// already have left the `Running` state, and interrupts must be off.
    pub(super) fn schedule(&self) {
        assert!(!self.intr.get(), "schedule with interrupts enabled");

        let current = self.running();
        assert_ne!(current.status(), Status::Running, "schedule from a running thread");

        let next = self.next_thread_to_run();
        assert!(!next.overflow(), "stack overflow in thread {:?}", next);

        #[cfg(feature = "debug")]
        log::trace!("[THREAD] switch {:?} -> {:?}", current, next);

        if Arc::ptr_eq(&current, &next) {
            self.schedule_tail();
            return;
        }

        *self.current.lock() = next.clone();
        *self.prev.lock() = Some(current.clone());

        if current.status() == Status::Dying {
            self.cpu.hand_off(next.id());
            return;
        }

        self.cpu.switch(current.id(), next.id());
        self.schedule_tail();
    }

    /// Second half of a switch, run by the incoming thread: mark it running,
    /// start a fresh time slice, and free the previous thread if it died.
    pub(super) fn schedule_tail(&self) {
        assert!(!self.intr.get(), "schedule_tail with interrupts enabled");

        let current = self.running();
        current.set_status(Status::Running);
        self.slice.store(0, SeqCst);

        let prev = self.prev.lock().take();
        if let Some(prev) = prev {
            if prev.status() == Status::Dying && !Arc::ptr_eq(&prev, &self.initial) {
                assert!(!Arc::ptr_eq(&prev, &current));
                prev.release_page();
                debug!("[THREAD] {:?}'s resources are released", prev);
            }
        }
    }

    /// Highest-priority ready thread, or the idle thread if none is ready.
    fn next_thread_to_run(&self) -> Arc<Thread> {
        let next = self.scheduler.lock().schedule();
        match next {
            Some(thread) => {
                thread.unlink(Queue::Ready);
                thread
            }
            None => match self.idle.lock().clone() {
                Some(idle) => idle,
                None => panic!("no thread to run before the idle thread exists"),
            },
        }
    }

    /// Body of the idle thread. Runs only when nothing else is ready.
    fn idle_loop(&self, started: &Semaphore) {
        started.up();

        loop {
            self.intr.set(false);
            self.block();
            self.intr.set(true);

            if !self.wait_for_interrupt() {
                return;
            }
        }
    }

    /// Hosted `wfi`: with nothing ready, the only way forward is a timer
    /// interrupt waking a sleeper. If nobody sleeps, nothing can ever run
    /// again, and the machine halts.
    fn wait_for_interrupt(&self) -> bool {
        let asleep = {
            let _guard = self.intr.disable();
            !self.alarm.lock().is_empty()
        };
        if !asleep {
            let blocked: Vec<_> = self
                .threads()
                .into_iter()
                .filter(|t| t.status() == Status::Blocked && !self.is_idle(t))
                .collect();
            self.cpu.halt(Box::new(format!(
                "kernel deadlock: all threads blocked, none asleep: {blocked:?}"
            )));
            return false;
        }

        self.timer_interrupt();
        true
    }

    /// Install the hook run by every thread right before it exits.
    pub fn set_exit_hook<F>(&self, hook: F)
    where
        F: Fn(&Arc<Thread>) + Send + Sync + 'static,
    {
        *self.exit_hook.lock() = Some(Arc::new(hook));
    }

    /// Second half of [`exit`](Manager::exit), run once the thread's
    /// function has unwound.
    pub(super) fn do_exit(&self) {
        let current = self.current();

        let hook = self.exit_hook.lock().clone();
        if let Some(hook) = hook {
            hook(&current);
        }

        self.intr.set(false);
        self.all.lock().retain(|t| !Arc::ptr_eq(t, &current));
        current.set_status(Status::Dying);

        debug!("[THREAD] Exit: {:?}", current);

        self.schedule();
    }

    pub(super) fn count_tick(&self, idle: bool) {
        if idle {
            self.idle_ticks.fetch_add(1, SeqCst);
        } else {
            self.kernel_ticks.fetch_add(1, SeqCst);
        }
    }

    pub fn stats(&self) -> Stats {
        Stats {
            idle_ticks: self.idle_ticks.load(SeqCst),
            kernel_ticks: self.kernel_ticks.load(SeqCst),
        }
    }

    /// Log tick statistics.
    pub fn print_stats(&self) {
        let stats = self.stats();
        info!(
            "Thread: {} idle ticks, {} kernel ticks",
            stats.idle_ticks, stats.kernel_ticks
        );
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Pages of the thread pool currently in use.
    pub fn pages_in_use(&self) -> usize {
        self.pages.in_use()
    }
}
