//! The middleware calling convention.

use super::{Builder, Warden};
use crate::environment::Environment;
use crate::errors::ActionError;
use async_trait::async_trait;
use std::sync::Arc;

/// A link in an action pipeline.
///
/// An action receives the environment and the rest of the chain. It decides
/// when (or whether) to continue by calling `app.call(env)`, so it can run
/// code both before and after the actions that follow it.
///
/// # Example
///
/// ```rust,ignore
/// struct Timed;
///
/// #[async_trait]
/// impl Action for Timed {
///     async fn call(&self, env: &mut Environment, app: &mut Warden) -> Result<(), ActionError> {
///         let started = std::time::Instant::now();
///         app.call(env).await?;
///         env.insert("elapsed_ms", serde_json::json!(started.elapsed().as_millis()));
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Action: Send + Sync {
    /// Returns the action name used in logs.
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Runs the action.
    async fn call(&self, env: &mut Environment, app: &mut Warden) -> Result<(), ActionError>;

    /// Undoes partial work after a failure anywhere in the chain.
    ///
    /// Called at most once per failure, only if this action was entered.
    /// Implementations must check for themselves how far they got.
    async fn recover(&self, _env: &mut Environment) {}
}

/// Anything that can be run against an environment as a whole.
#[async_trait]
pub trait App: Send + Sync {
    /// Runs against the environment.
    async fn call(&self, env: &mut Environment) -> Result<(), ActionError>;
}

#[async_trait]
impl App for Builder {
    async fn call(&self, env: &mut Environment) -> Result<(), ActionError> {
        let mut warden = self.to_app(env);
        warden.call(env).await
    }
}

/// Signature of plain function middleware.
pub type ActionFn = dyn Fn(&mut Environment) -> Result<(), ActionError> + Send + Sync;

/// Wraps a plain function so that calling it always continues the chain.
pub(crate) struct FnAction {
    name: String,
    func: Arc<ActionFn>,
}

impl FnAction {
    pub(crate) fn new(name: impl Into<String>, func: Arc<ActionFn>) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

#[async_trait]
impl Action for FnAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, env: &mut Environment, app: &mut Warden) -> Result<(), ActionError> {
        (self.func)(env)?;
        app.call(env).await
    }
}

/// Returns the last path segment of a type name, ignoring generic arguments.
pub(crate) fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    let start = base.rfind("::").map_or(0, |idx| idx + 2);
    &full[start..]
}
