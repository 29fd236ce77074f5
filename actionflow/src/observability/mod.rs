//! Observability utilities.
//!
//! The crate logs through `tracing`; this module installs a subscriber for
//! binaries and tests that want to see those events.

mod logging;

pub use logging::{init_tracing, LogConfig, LogFormat};
