//! Recoverable errors.
//!
//! Broken invariants (releasing a lock that is not held, sleeping inside
//! an interrupt handler, ...) are not errors: they panic, which halts the
//! kernel.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The page pool has no room for another thread control block.
    #[error("out of thread pages")]
    OutOfMemory,
    /// A non-blocking acquire found the resource unavailable.
    #[error("resource busy")]
    Busy,
    /// The host refused to start the thread backing a kernel thread.
    #[error("failed to start host thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("invalid kernel option: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = core::result::Result<T, Error>;
