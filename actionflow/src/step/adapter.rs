//! Runs steps as pipeline actions.

use super::{call_step, Params, Step};
use crate::action::{Action, StackItem, Warden};
use crate::environment::Environment;
use crate::errors::ActionError;
use async_trait::async_trait;
use std::any::TypeId;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Adapts a [`Step`] into an [`Action`].
///
/// The step's parameters are the environment's data. Its outputs are written
/// back into the environment before the chain continues.
pub struct StepAction<S> {
    name: String,
    step: Mutex<S>,
}

impl<S: Step> StepAction<S> {
    /// Wraps a step.
    pub fn new(step: S) -> Self {
        Self {
            name: step.name().to_string(),
            step: Mutex::new(step),
        }
    }
}

#[async_trait]
impl<S: Step + 'static> Action for StepAction<S> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, env: &mut Environment, app: &mut Warden) -> Result<(), ActionError> {
        let params: Params = env.data().clone();
        let outputs = {
            let mut step = self.step.lock().await;
            call_step(&mut *step, params).await?
        };

        for (key, value) in outputs {
            env.insert(key, value);
        }

        app.call(env).await
    }
}

impl StackItem {
    /// An item running a fresh `S::default()` step on every materialization.
    #[must_use]
    pub fn step<S>() -> Self
    where
        S: Step + Default + 'static,
    {
        Self::step_with(|_| S::default())
    }

    /// An item running the step built by `factory`.
    #[must_use]
    pub fn step_with<S, F>(factory: F) -> Self
    where
        S: Step + 'static,
        F: Fn(&Environment) -> S + Send + Sync + 'static,
    {
        Self::from_parts(
            std::any::type_name::<S>(),
            Some(TypeId::of::<S>()),
            Arc::new(move |env| Arc::new(StepAction::new(factory(env))) as Arc<dyn Action>),
        )
    }
}
