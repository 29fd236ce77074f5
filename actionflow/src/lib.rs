//! # Actionflow
//!
//! Middleware pipelines for machine lifecycle actions.
//!
//! Actionflow runs ordered sequences of actions where every action wraps the
//! rest of the chain, with support for:
//!
//! - **Onion-style middleware**: each action runs code before and after the actions that follow it
//! - **Exactly-once recovery**: every entered action is recovered once when anything fails
//! - **Hooks**: plugins inject middleware before, after, or around named pipelines
//! - **Lazy registry**: named pipelines are built fresh for every run
//! - **Cooperative interrupts**: Ctrl-C stops the chain at the next action boundary
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use actionflow::prelude::*;
//!
//! let runner = Runner::new();
//! runner.registry().register("halt", || Builder::build(StackItem::action::<GracefulHalt>()));
//! runner.registry().register("start", || Builder::build(StackItem::action::<Boot>()));
//! runner.registry().register_composite("reload", |reg| {
//!     let mut builder = Builder::new();
//!     builder.push(reg.get("halt").unwrap_or_default());
//!     builder.push(reg.get("start").unwrap_or_default());
//!     builder
//! });
//!
//! let env = runner.run("reload", Options::new()).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod action;
pub mod builtin;
pub mod cancellation;
pub mod environment;
pub mod errors;
pub mod observability;
pub mod step;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::action::{
        Action, Anchor, App, Builder, Callable, Hook, Hooks, Registry, Runner,
        RunnerConfig, StackItem, Warden,
    };
    pub use crate::builtin::{
        catch_domain_error, catch_domain_error_async, record_domain_error, Call, EnvSet,
    };
    pub use crate::cancellation::InterruptSource;
    pub use crate::environment::{Environment, Options};
    pub use crate::errors::{ActionError, BuilderError, DomainError, MultiStepError};
    pub use crate::step::{call_step, MultiStep, Params, Source, Step};
}

pub use errors::{ActionError, DomainError};
