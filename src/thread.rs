//! Kernel Threads

pub mod alarm;
pub mod donate;
mod imp;
pub mod manager;
pub mod mlfqs;
pub mod scheduler;
pub mod switch;

pub use self::imp::*;
pub use self::manager::{ExitHook, Manager, Stats};
pub(self) use self::scheduler::{Schedule, Scheduler};

use self::donate::Donate;

use alloc::sync::Arc;
use core::sync::atomic::Ordering::SeqCst;

use log::debug;

use crate::error::Result;

impl Manager {
    /// Create a new thread running `f` and return its id.
    pub fn create<F>(self: &Arc<Self>, name: &'static str, priority: u32, f: F) -> Result<Tid>
    where
        F: FnOnce() + Send + 'static,
    {
        Builder::new(f)
            .name(name)
            .priority(priority)
            .spawn(self)
            .map(|t| t.id())
    }

    /// Create a new thread at the default priority.
    pub fn spawn<F>(self: &Arc<Self>, name: &'static str, f: F) -> Result<Arc<Thread>>
    where
        F: FnOnce() + Send + 'static,
    {
        Builder::new(f).name(name).spawn(self)
    }

    /// Get the current running thread
    pub fn current(&self) -> Arc<Thread> {
        let current = self.running();
        assert!(!current.overflow(), "stack overflow in thread {:?}", current);
        assert_eq!(current.status(), Status::Running);
        current
    }

    /// Mark the current thread as [`Blocked`](Status::Blocked) and
    /// yield the control to another thread. Interrupts must be off; some
    /// other thread has to [`unblock`](Manager::unblock) it later.
    pub fn block(&self) {
        assert!(!self.intr.in_context(), "block in interrupt context");
        assert!(!self.intr.get(), "block with interrupts enabled");

        let current = self.current();
        current.set_status(Status::Blocked);

        #[cfg(feature = "debug")]
        log::trace!("[THREAD] Block {:?}", current);

        self.schedule();
    }

    /// Wake up a previously blocked thread, mark it as [`Ready`](Status::Ready),
    /// and register it into the scheduler. Never preempts the caller, so it
    /// is safe inside interrupt handlers.
    pub fn unblock(&self, thread: &Arc<Thread>) {
        let _guard = self.intr.disable();
        assert_eq!(
            thread.status(),
            Status::Blocked,
            "unblock of {:?}, which is not blocked",
            thread
        );

        #[cfg(feature = "debug")]
        log::trace!("[THREAD] Wake up {:?} with priority {}", thread, thread.priority());

        self.register(thread.clone());
        thread.set_status(Status::Ready);
    }

    /// Yield the control to another thread (if there's another one ready to run).
    pub fn yield_now(&self) {
        assert!(!self.intr.in_context(), "yield in interrupt context");

        let _guard = self.intr.disable();
        let current = self.current();
        if !self.is_idle(&current) {
            self.register(current.clone());
        }
        current.set_status(Status::Ready);
        self.schedule();
    }

    /// Gracefully shut down the current thread, and schedule another one.
    ///
    /// The thread's function unwinds first, so values it owns are dropped
    /// (a held [`MutexGuard`](crate::sync::MutexGuard) releases its lock).
    /// The exit hook then runs, and the thread's page is freed by whichever
    /// thread runs next.
    pub fn exit(&self) -> ! {
        assert!(!self.intr.in_context(), "exit in interrupt context");

        let current = self.current();
        assert!(
            !Arc::ptr_eq(&current, &self.initial),
            "the initial thread cannot exit"
        );

        std::panic::resume_unwind(alloc::boxed::Box::new(Exit))
    }

    /// Returns the current thread's effective priority.
    pub fn get_priority(&self) -> u32 {
        let _guard = self.intr.disable();
        self.current().priority()
    }

    /// Sets the current thread's base priority. The effective priority
    /// stays raised while donors outrank it. Yields if a ready thread now
    /// outranks the current one. Ignored in MLFQS mode.
    pub fn set_priority(&self, priority: u32) {
        assert!(
            (PRI_MIN..=PRI_MAX).contains(&priority),
            "priority {priority} out of range"
        );

        if self.config.mlfqs() {
            debug!("[THREAD] set_priority({priority}) ignored in MLFQS mode");
            return;
        }

        {
            let _guard = self.intr.disable();
            let current = self.current();
            current.set_base_priority(priority);
            Donate::update_thread_priority(self, &current);

            #[cfg(feature = "debug")]
            log::trace!(
                "[THREAD] set_priority {:?}: base {}, effective {}",
                current,
                priority,
                current.priority()
            );
        }

        self.yield_if_outranked();
    }

    /// Make the current thread sleep until the timer reaches `tick`. A tick
    /// already in the past returns immediately.
    pub fn sleep_until(&self, tick: i64) {
        assert!(!self.intr.in_context(), "sleep in interrupt context");
        assert!(self.intr.get(), "sleep with interrupts disabled");

        let _guard = self.intr.disable();
        if tick <= self.timer.timer_ticks() {
            return;
        }

        let current = self.current();
        assert!(!self.is_idle(&current), "the idle thread cannot sleep");

        self.alarm.lock().register(current.clone(), tick);
        current.set_status(Status::Blocked);

        #[cfg(feature = "debug")]
        log::trace!("[THREAD] {:?} sleeps until {}", current, tick);

        self.schedule();
    }

    /// Make the current thread sleep for the given ticks.
    pub fn sleep(&self, ticks: i64) {
        if ticks <= 0 {
            return;
        }
        self.sleep_until(self.timer.timer_ticks() + ticks);
    }

    pub fn timer_ticks(&self) -> i64 {
        self.timer.timer_ticks()
    }

    pub fn timer_elapsed(&self, then: i64) -> i64 {
        self.timer.timer_elapsed(then)
    }

    /// Per-tick work of the timer interrupt handler for tick `now`. Decay
    /// bookkeeping sees the system as it was before due sleepers wake.
    pub fn tick_elapsed(&self, now: i64) {
        assert!(
            self.intr.in_context(),
            "tick_elapsed outside the timer interrupt handler"
        );

        let current = self.running();
        let idle = self.is_idle(&current);
        self.count_tick(idle);

        if self.config.mlfqs() {
            self.mlfqs_tick(now, &current, idle);
        }

        let due = self.alarm.lock().expire(now);
        for thread in due.iter() {
            self.unblock(thread);
        }

        let slice = self.slice.fetch_add(1, SeqCst) + 1;
        if slice >= self.config.time_slice || self.outranked() {
            self.intr.yield_on_return();
        }
    }

    /// Raise one timer interrupt on behalf of the running thread, which
    /// yields afterwards if the handler asked it to. Interrupts must be on.
    pub fn timer_interrupt(&self) {
        self.intr.enter(|| {
            let now = self.timer.advance();
            self.tick_elapsed(now);
        });

        if self.intr.take_yield_on_return() {
            self.yield_now();
        }
    }

    /// Invoke `action` on every live thread with interrupts disabled.
    pub fn foreach<F>(&self, mut action: F)
    where
        F: FnMut(&Arc<Thread>),
    {
        let _guard = self.intr.disable();
        for thread in self.threads().iter() {
            action(thread);
        }
    }

    /// Current interrupt level.
    pub fn intr_get_level(&self) -> bool {
        self.intr.get()
    }

    /// Set the interrupt level and return the previous one.
    pub fn intr_set_level(&self, level: bool) -> bool {
        self.intr.set(level)
    }

    /// Disable interrupts until the returned guard drops.
    pub fn intr_disable(&self) -> crate::sbi::interrupt::IntrGuard<'_> {
        self.intr.disable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn boot_leaves_main_running() {
        let manager = Manager::boot(Config::default()).unwrap();
        let main = manager.current();
        assert_eq!(main.name(), "main");
        assert_eq!(main.id(), Tid(1));
        assert_eq!(main.priority(), PRI_DEFAULT);
        assert!(manager.intr_get_level());
        assert_eq!(manager.pages_in_use(), 2);
    }

    #[test]
    fn mlfqs_main_starts_at_top() {
        let config = Config::default().with_policy(crate::config::Policy::Mlfqs);
        let manager = Manager::boot(config).unwrap();
        assert_eq!(manager.get_priority(), PRI_MAX);
        manager.set_priority(10);
        assert_eq!(manager.get_priority(), PRI_MAX);
    }

    #[test]
    #[should_panic(expected = "stack overflow")]
    fn smashed_magic_is_fatal() {
        let manager = Manager::boot(Config::default()).unwrap();
        manager.current().smash_magic();
        manager.current();
    }

    #[test]
    #[should_panic(expected = "block with interrupts enabled")]
    fn block_requires_interrupts_off() {
        let manager = Manager::boot(Config::default()).unwrap();
        manager.block();
    }

    #[test]
    fn sleep_in_the_past_returns() {
        let manager = Manager::boot(Config::default()).unwrap();
        manager.sleep_until(0);
        manager.sleep(0);
        manager.sleep(-5);
        assert_eq!(manager.timer_ticks(), 0);
    }
}
