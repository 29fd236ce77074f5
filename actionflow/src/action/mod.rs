//! The action middleware pipeline.
//!
//! This module provides:
//! - The [`Action`] calling convention and [`StackItem`] factories
//! - The editable [`Builder`] and its materialized form, the [`Warden`]
//! - [`Hook`] insertion directives applied when a builder is materialized
//! - A lazy [`Registry`] of named pipelines
//! - The [`Runner`] that executes a pipeline inside a busy region

mod builder;
mod config;
mod hook;
mod item;
mod registry;
mod runner;
mod unit;
mod warden;

pub use builder::Builder;
pub use config::RunnerConfig;
pub use hook::{ApplyOptions, Hook, Hooks};
pub use item::{ActionFactory, Anchor, Middleware, StackItem};
pub use registry::Registry;
pub use runner::{Callable, ForceAbort, Runner};
pub use unit::{Action, ActionFn, App};
pub(crate) use unit::short_type_name;
pub use warden::{Finalized, RecoveryScope, Warden, WardenState};
