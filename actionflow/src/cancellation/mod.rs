//! Cooperative interruption.
//!
//! This module provides:
//! - The per-invocation interrupted flag polled by the warden
//! - A process-level interrupt source (Ctrl-C or manual triggers)
//! - Busy regions that route interrupts to a callback while an action runs

mod busy;
mod interrupt;
mod source;

pub use busy::{run_busy, BusyGuard};
pub use interrupt::InterruptFlag;
pub use source::{ExitHandler, InterruptSource, UNHANDLED_INTERRUPT_EXIT_CODE};
