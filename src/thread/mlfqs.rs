//! Decay scheduling: priorities computed from recent CPU usage and niceness.
//!
//! Every second the load average and every thread's `recent_cpu` decay;
//! every fourth tick every thread's priority is recomputed from them. The
//! running thread's `recent_cpu` grows by one each tick. Donation is off
//! in this mode and `set_priority` has no effect.

use alloc::sync::Arc;

use log::{debug, trace};

use crate::fixed::Fixed;
use crate::thread::{Manager, Queue, Schedule, Status, Thread, NICE_MAX, NICE_MIN, PRI_MAX, PRI_MIN};

/// Ticks between two priority recomputations.
pub const PRIORITY_INTERVAL: i64 = 4;

/// `PRI_MAX - recent_cpu / 4 - nice * 2`, rounded to nearest and clamped
/// to the valid priority range.
pub fn calc_priority(recent_cpu: Fixed, nice: i32) -> u32 {
    let priority = (Fixed::from_int(PRI_MAX as i32) - recent_cpu / 4 - Fixed::from_int(nice) * 2).round();
    priority.clamp(PRI_MIN as i32, PRI_MAX as i32) as u32
}

/// `(59/60) * load_avg + (1/60) * ready`
pub fn calc_load_avg(load_avg: Fixed, ready: usize) -> Fixed {
    load_avg * 59 / 60 + Fixed::from_int(ready as i32) / 60
}

/// `(2 * load_avg) / (2 * load_avg + 1) * recent_cpu + nice`
pub fn calc_recent_cpu(load_avg: Fixed, recent_cpu: Fixed, nice: i32) -> Fixed {
    let twice = load_avg * 2;
    twice / (twice + 1) * recent_cpu + nice
}

impl Manager {
    /// Decay bookkeeping for the tick `now`, run from the timer interrupt.
    pub(super) fn mlfqs_tick(&self, now: i64, current: &Arc<Thread>, idle: bool) {
        if !idle {
            current.set_recent_cpu(current.recent_cpu() + 1);
        }

        if now % self.config.timer_freq as i64 == 0 {
            let ready = self.scheduler.lock().len() + usize::from(!idle);
            let load_avg = {
                let mut load_avg = self.load_avg.lock();
                *load_avg = calc_load_avg(*load_avg, ready);
                *load_avg
            };
            debug!("[MLFQS] tick {now}: load_avg {load_avg:?}, {ready} ready");

            for thread in self.threads().iter().filter(|t| !self.is_idle(t)) {
                thread.set_recent_cpu(calc_recent_cpu(load_avg, thread.recent_cpu(), thread.nice()));
            }
        }

        if now % PRIORITY_INTERVAL == 0 {
            for thread in self.threads().iter().filter(|t| !self.is_idle(t)) {
                self.refresh_mlfqs_priority(thread);
            }
        }
    }

    /// Recompute a thread's priority from its `recent_cpu` and `nice`,
    /// moving it within the ready queue if it is queued there.
    fn refresh_mlfqs_priority(&self, thread: &Arc<Thread>) {
        let priority = calc_priority(thread.recent_cpu(), thread.nice());
        if priority == thread.priority() {
            return;
        }

        trace!("[MLFQS] {:?}: priority {} -> {}", thread, thread.priority(), priority);
        thread.set_priority(priority);
        if thread.status() == Status::Ready && thread.queue() == Queue::Ready {
            self.scheduler.lock().change_priority(thread.clone(), priority);
        }
    }

    /// Sets the current thread's nice value and recomputes its priority.
    /// Yields if a ready thread now outranks it.
    pub fn set_nice(&self, nice: i32) {
        assert!(
            (NICE_MIN..=NICE_MAX).contains(&nice),
            "nice value {nice} out of range"
        );

        {
            let _guard = self.intr.disable();
            let current = self.current();
            current.set_nice(nice);
            if self.config.mlfqs() {
                self.refresh_mlfqs_priority(&current);
            }
        }

        self.yield_if_outranked();
    }

    pub fn get_nice(&self) -> i32 {
        let _guard = self.intr.disable();
        self.current().nice()
    }

    /// 100 times the system load average, rounded to nearest.
    pub fn get_load_avg(&self) -> i32 {
        let _guard = self.intr.disable();
        self.load_avg.lock().scaled_round(100)
    }

    /// 100 times the current thread's `recent_cpu`, rounded to nearest.
    pub fn get_recent_cpu(&self) -> i32 {
        let _guard = self.intr.disable();
        self.current().recent_cpu().scaled_round(100)
    }
}
