//! Lazy registry of named values.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

type Factory<T> = Arc<dyn Fn(&Registry<T>) -> T + Send + Sync>;

/// Maps names to factories evaluated on every lookup.
///
/// Registration builds nothing. Each [`Registry::get`] runs the factory
/// again, so every caller receives an independent value it may mutate
/// freely. Factories run outside the internal lock and receive the registry,
/// which lets composite entries resolve other names when they are built.
pub struct Registry<T> {
    items: RwLock<HashMap<String, Factory<T>>>,
}

impl<T> Registry<T> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a factory under `name`, replacing any previous one.
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.register_composite(name, move |_| factory());
    }

    /// Registers a factory that may look up other entries.
    pub fn register_composite<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Self) -> T + Send + Sync + 'static,
    {
        self.items.write().insert(name.into(), Arc::new(factory));
    }

    /// Builds the value registered under `name`.
    pub fn get(&self, name: &str) -> Option<T> {
        let factory = self.items.read().get(name).cloned();
        match factory {
            Some(factory) => Some(factory(self)),
            None => {
                debug!(name, "Registry has no entry");
                None
            }
        }
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.items.read().contains_key(name)
    }

    /// Returns the registered names, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.items.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Removes the entry for `name`. Returns true if it existed.
    pub fn remove(&self, name: &str) -> bool {
        self.items.write().remove(name).is_some()
    }

    /// Copies every entry of `other` into this registry.
    ///
    /// Entries of `other` replace entries with the same name.
    pub fn merge(&self, other: &Self) {
        let incoming: Vec<(String, Factory<T>)> = other
            .items
            .read()
            .iter()
            .map(|(name, factory)| (name.clone(), Arc::clone(factory)))
            .collect();
        self.items.write().extend(incoming);
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("keys", &self.keys())
            .finish()
    }
}
