//! The hosted machine interface: interrupt control and the timer.

pub mod interrupt;
pub mod timer;
