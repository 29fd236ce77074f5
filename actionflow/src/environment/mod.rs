//! The shared environment passed through an action pipeline.
//!
//! This module provides:
//! - The per-invocation [`Environment`] with typed control fields
//! - [`Options`] used to seed an environment

mod options;
mod store;

pub use options::Options;
pub use store::Environment;
