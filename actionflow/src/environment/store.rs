//! The environment store.

use super::Options;
use crate::action::Hook;
use crate::cancellation::InterruptFlag;
use crate::errors::{ActionError, CapturedError, DomainError};
use serde::de::DeserializeOwned;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Mutable state shared by every action of one invocation.
///
/// The environment is the only channel through which actions communicate.
/// Alongside an open key/value namespace it carries a few reserved control
/// fields: the interrupted flag, the first captured error, the domain error
/// recorded by [`catch_domain_error`](crate::builtin::catch_domain_error),
/// and the hook state consulted by [`Builder::to_app`](crate::action::Builder::to_app).
pub struct Environment {
    run_id: Uuid,
    data: HashMap<String, serde_json::Value>,
    extensions: HashMap<String, Arc<dyn Any + Send + Sync>>,
    interrupt: Arc<InterruptFlag>,
    error: Option<CapturedError>,
    domain_error: Option<DomainError>,
    action_name: Option<String>,
    hook: Option<Arc<Hook>>,
    hooks_applied: bool,
}

impl Environment {
    /// Creates an empty environment with a fresh run ID.
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            data: HashMap::new(),
            extensions: HashMap::new(),
            interrupt: Arc::new(InterruptFlag::new()),
            error: None,
            domain_error: None,
            action_name: None,
            hook: None,
            hooks_applied: false,
        }
    }

    /// Creates an environment seeded with `options`.
    #[must_use]
    pub fn from_options(options: Options) -> Self {
        let mut env = Self::new();
        env.merge(options);
        env
    }

    /// Merges options into the environment, overwriting existing keys.
    pub fn merge(&mut self, options: Options) {
        self.data.extend(options.data);
        self.extensions.extend(options.extensions);
    }

    /// Returns the ID of this invocation.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Gets a data value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Gets a data value deserialized into `T`.
    #[must_use]
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Sets a data value, returning the previous one.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Option<serde_json::Value> {
        self.data.insert(key.into(), value)
    }

    /// Removes a data value.
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.data.remove(key)
    }

    /// Checks if a data key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Returns all data keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.data.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Returns the data namespace.
    #[must_use]
    pub const fn data(&self) -> &HashMap<String, serde_json::Value> {
        &self.data
    }

    /// Stores an opaque extension value.
    pub fn insert_extension<T>(&mut self, key: impl Into<String>, value: Arc<T>)
    where
        T: Any + Send + Sync,
    {
        self.extensions.insert(key.into(), value);
    }

    /// Gets an extension value if it exists and has type `T`.
    #[must_use]
    pub fn extension<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.extensions
            .get(key)
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
    }

    /// Marks the invocation as interrupted.
    ///
    /// Returns true if this call set the flag.
    pub fn interrupt(&self) -> bool {
        self.interrupt.interrupt()
    }

    /// Returns whether the invocation was interrupted.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.interrupt.is_interrupted()
    }

    /// Returns a handle to the interrupted flag for signal handlers.
    #[must_use]
    pub fn interrupt_flag(&self) -> Arc<InterruptFlag> {
        Arc::clone(&self.interrupt)
    }

    /// Returns the first error captured during this invocation.
    #[must_use]
    pub const fn error(&self) -> Option<&CapturedError> {
        self.error.as_ref()
    }

    /// Records `error` unless an error was already captured.
    ///
    /// Returns true if the error was recorded.
    pub fn record_error(&mut self, error: &ActionError) -> bool {
        if self.error.is_some() {
            return false;
        }
        self.error = Some(CapturedError::from_error(error));
        true
    }

    /// Records an expected domain failure.
    pub fn set_domain_error(&mut self, error: DomainError) {
        self.domain_error = Some(error);
    }

    /// Returns the recorded domain failure.
    #[must_use]
    pub const fn domain_error(&self) -> Option<&DomainError> {
        self.domain_error.as_ref()
    }

    /// Returns true if a domain failure was recorded.
    #[must_use]
    pub const fn has_domain_error(&self) -> bool {
        self.domain_error.is_some()
    }

    /// Returns the name of the action being run, if it was run by name.
    #[must_use]
    pub fn action_name(&self) -> Option<&str> {
        self.action_name.as_deref()
    }

    /// Sets the action name.
    pub fn set_action_name(&mut self, name: impl Into<String>) {
        self.action_name = Some(name.into());
    }

    /// Returns the hook applied when builders are materialized.
    #[must_use]
    pub fn hook(&self) -> Option<Arc<Hook>> {
        self.hook.clone()
    }

    /// Sets the hook applied when builders are materialized.
    pub fn set_hook(&mut self, hook: Arc<Hook>) {
        self.hook = Some(hook);
    }

    /// Returns whether the hook's prepend and append directives already ran.
    #[must_use]
    pub const fn hooks_applied(&self) -> bool {
        self.hooks_applied
    }

    /// Marks the hook's prepend and append directives as applied.
    ///
    /// Returns the previous value.
    pub fn mark_hooks_applied(&mut self) -> bool {
        std::mem::replace(&mut self.hooks_applied, true)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut extension_keys: Vec<_> = self.extensions.keys().collect();
        extension_keys.sort();
        f.debug_struct("Environment")
            .field("run_id", &self.run_id)
            .field("action_name", &self.action_name)
            .field("data", &self.data)
            .field("extensions", &extension_keys)
            .field("interrupted", &self.is_interrupted())
            .field("error", &self.error)
            .field("domain_error", &self.domain_error)
            .field("hooks_applied", &self.hooks_applied)
            .finish_non_exhaustive()
    }
}
