//! Initial values for a fresh environment.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Caller-supplied values merged into a new [`Environment`](super::Environment).
///
/// Plain data goes into the JSON namespace; opaque collaborators such as a
/// machine handle or a UI object go into extensions.
#[derive(Clone, Default)]
pub struct Options {
    pub(crate) data: HashMap<String, serde_json::Value>,
    pub(crate) extensions: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Options {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a data value.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Adds an extension value.
    #[must_use]
    pub fn with_extension<T>(mut self, key: impl Into<String>, value: Arc<T>) -> Self
    where
        T: Any + Send + Sync,
    {
        self.extensions.insert(key.into(), value);
        self
    }

    /// Inserts a data value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.insert(key.into(), value);
    }

    /// Returns true if no values are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.extensions.is_empty()
    }
}

impl From<HashMap<String, serde_json::Value>> for Options {
    fn from(data: HashMap<String, serde_json::Value>) -> Self {
        Self {
            data,
            extensions: HashMap::new(),
        }
    }
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut extension_keys: Vec<_> = self.extensions.keys().collect();
        extension_keys.sort();
        f.debug_struct("Options")
            .field("data", &self.data)
            .field("extensions", &extension_keys)
            .finish()
    }
}
