//! Interrupt control for the single simulated CPU.
//!
//! The level is a property of the CPU, not of a thread: a thread that
//! disables interrupts and then switches away finds them disabled again
//! when it is resumed, because every switch happens with interrupts off.

use core::sync::atomic::{AtomicBool, Ordering::SeqCst};

pub struct Interrupt {
    enabled: AtomicBool,
    /// Set while an external interrupt handler runs.
    context: AtomicBool,
    /// A handler asked the interrupted thread to yield once it returns.
    yield_on_return: AtomicBool,
}

impl Interrupt {
    /// Interrupts start disabled, as they are at boot.
    pub const fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            context: AtomicBool::new(false),
            yield_on_return: AtomicBool::new(false),
        }
    }

    /// Get the current interrupt level.
    pub fn get(&self) -> bool {
        self.enabled.load(SeqCst)
    }

    /// Set the interrupt level and return the previous one.
    pub fn set(&self, level: bool) -> bool {
        self.enabled.swap(level, SeqCst)
    }

    /// Disable interrupts until the returned guard is dropped, which
    /// restores the previous level.
    pub fn disable(&self) -> IntrGuard<'_> {
        IntrGuard {
            intr: self,
            old: self.set(false),
        }
    }

    /// Whether the CPU is running an external interrupt handler.
    pub fn in_context(&self) -> bool {
        self.context.load(SeqCst)
    }

    /// Run `handler` as an external interrupt: interrupts off, inside
    /// interrupt context. Handlers do not nest.
    pub fn enter<R>(&self, handler: impl FnOnce() -> R) -> R {
        assert!(self.get(), "interrupt raised while interrupts are disabled");
        assert!(!self.in_context(), "nested external interrupt");

        let _guard = self.disable();
        self.context.store(true, SeqCst);
        let result = handler();
        self.context.store(false, SeqCst);
        result
    }

    /// From inside a handler: make the interrupted thread yield on return.
    pub fn yield_on_return(&self) {
        assert!(self.in_context());
        self.yield_on_return.store(true, SeqCst);
    }

    pub(crate) fn take_yield_on_return(&self) -> bool {
        self.yield_on_return.swap(false, SeqCst)
    }
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}

/// Restores the saved interrupt level on drop.
#[must_use = "interrupts are re-enabled as soon as the guard is dropped"]
pub struct IntrGuard<'a> {
    intr: &'a Interrupt,
    old: bool,
}

impl IntrGuard<'_> {
    /// The level that will be restored.
    pub fn old_level(&self) -> bool {
        self.old
    }
}

impl Drop for IntrGuard<'_> {
    fn drop(&mut self) {
        self.intr.set(self.old);
    }
}
