//! Testing utilities for action pipelines.
//!
//! This module provides:
//! - A shared [`Recorder`] for asserting call order
//! - Mock actions that record, fail, halt or interrupt

mod mocks;

pub use mocks::{FailingAction, HaltingAction, InterruptingAction, Recorder, RecordingAction};
