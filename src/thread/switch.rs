//! Context switch on the hosted CPU.
//!
//! Each kernel thread runs on its own host thread, but only the holder of
//! the CPU baton executes kernel code. Switching from `prev` to `next`
//! passes the baton to `next` and parks `prev` until some later switch
//! hands the baton back.
//!
//! A kernel panic halts the CPU. The halt payload is re-raised on the boot
//! thread (the host thread that called [`Manager::boot`](super::Manager::boot))
//! as soon as it waits for the baton, so failures reach the host.

use alloc::boxed::Box;
use core::any::Any;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::thread::Tid;

struct Baton {
    /// Thread allowed to run.
    running: Tid,
    stopped: bool,
    halted: Option<Box<dyn Any + Send>>,
}

pub struct Cpu {
    baton: Mutex<Baton>,
    turn: Condvar,
    boot: Tid,
}

impl Cpu {
    /// A CPU whose baton starts with the boot thread.
    pub fn new(boot: Tid) -> Self {
        Self {
            baton: Mutex::new(Baton {
                running: boot,
                stopped: false,
                halted: None,
            }),
            turn: Condvar::new(),
            boot,
        }
    }

    /// Give the CPU to `next`, then sleep until `prev` owns it again.
    pub fn switch(&self, prev: Tid, next: Tid) {
        let mut baton = self.baton.lock();
        baton.running = next;
        self.turn.notify_all();
        self.wait(&mut baton, prev);
    }

    /// Give the CPU to `next` without waiting to get it back. Used by a
    /// dying thread, whose host thread ends right after.
    pub fn hand_off(&self, next: Tid) {
        self.baton.lock().running = next;
        self.turn.notify_all();
    }

    /// Sleep until `tid` owns the CPU. A new thread calls this before its
    /// first instruction.
    pub fn wait_turn(&self, tid: Tid) {
        let mut baton = self.baton.lock();
        self.wait(&mut baton, tid);
    }

    /// Stop the machine. Nothing runs on this CPU afterwards; the boot
    /// thread unwinds with `payload`.
    pub fn halt(&self, payload: Box<dyn Any + Send>) {
        let mut baton = self.baton.lock();
        if !baton.stopped {
            baton.stopped = true;
            baton.halted = Some(payload);
        }
        self.turn.notify_all();
    }

    pub fn is_halted(&self) -> bool {
        self.baton.lock().stopped
    }

    fn wait(&self, baton: &mut MutexGuard<'_, Baton>, tid: Tid) {
        while baton.running != tid {
            if tid == self.boot {
                if let Some(payload) = baton.halted.take() {
                    std::panic::resume_unwind(payload);
                }
            }
            self.turn.wait(baton);
        }
    }
}
