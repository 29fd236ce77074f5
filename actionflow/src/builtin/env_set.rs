//! Setting environment values from inside a pipeline.

use crate::action::{Action, StackItem, Warden};
use crate::environment::Environment;
use crate::errors::ActionError;
use async_trait::async_trait;
use std::collections::HashMap;

/// Merges fixed values into the environment, then continues.
#[derive(Debug, Clone, Default)]
pub struct EnvSet {
    values: HashMap<String, serde_json::Value>,
}

impl EnvSet {
    /// Creates an action that sets `values`.
    #[must_use]
    pub fn new(values: HashMap<String, serde_json::Value>) -> Self {
        Self { values }
    }

    /// Adds one value.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    /// Wraps this action in a stack item.
    #[must_use]
    pub fn into_item(self) -> StackItem {
        StackItem::with(move |_| self.clone())
    }
}

#[async_trait]
impl Action for EnvSet {
    async fn call(&self, env: &mut Environment, app: &mut Warden) -> Result<(), ActionError> {
        for (key, value) in &self.values {
            env.insert(key.clone(), value.clone());
        }
        app.call(env).await
    }
}
