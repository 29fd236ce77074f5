//! Pipeline builder with list-editing semantics.

use super::hook::ApplyOptions;
use super::{Anchor, Middleware, StackItem, Warden};
use crate::environment::Environment;
use crate::errors::BuilderError;
use tracing::debug;

/// An ordered, editable list of middleware.
///
/// A builder is a recipe: it holds stack items, not running actions.
/// [`Builder::to_app`] turns it into a [`Warden`] for one invocation.
/// Cloning a builder copies its stack, so edits to a clone never reach the
/// original.
#[derive(Debug, Clone, Default)]
pub struct Builder {
    stack: Vec<StackItem>,
}

impl Builder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder holding `middleware`.
    #[must_use]
    pub fn build(middleware: impl Into<Middleware>) -> Self {
        let mut builder = Self::new();
        builder.push(middleware);
        builder
    }

    /// Appends middleware. Builders are flattened into their items.
    pub fn push(&mut self, middleware: impl Into<Middleware>) -> &mut Self {
        self.stack.extend(middleware.into().into_items());
        self
    }

    /// Appends middleware, consuming and returning the builder.
    #[must_use]
    pub fn with(mut self, middleware: impl Into<Middleware>) -> Self {
        self.push(middleware);
        self
    }

    /// Inserts middleware before the entry located by `anchor`.
    ///
    /// An index anchor may equal the stack length to insert at the end.
    ///
    /// # Errors
    ///
    /// Returns an error if the anchor does not resolve.
    pub fn insert(
        &mut self,
        anchor: impl Into<Anchor>,
        middleware: impl Into<Middleware>,
    ) -> Result<&mut Self, BuilderError> {
        let idx = self.resolve_insert(&anchor.into())?;
        self.splice_at(idx, middleware.into().into_items());
        Ok(self)
    }

    /// Alias for [`Builder::insert`].
    ///
    /// # Errors
    ///
    /// Returns an error if the anchor does not resolve.
    pub fn insert_before(
        &mut self,
        anchor: impl Into<Anchor>,
        middleware: impl Into<Middleware>,
    ) -> Result<&mut Self, BuilderError> {
        self.insert(anchor, middleware)
    }

    /// Inserts middleware after the entry located by `anchor`.
    ///
    /// # Errors
    ///
    /// Returns an error if the anchor does not resolve.
    pub fn insert_after(
        &mut self,
        anchor: impl Into<Anchor>,
        middleware: impl Into<Middleware>,
    ) -> Result<&mut Self, BuilderError> {
        let idx = self.resolve_existing(&anchor.into())?;
        self.splice_at(idx + 1, middleware.into().into_items());
        Ok(self)
    }

    /// Replaces the entry located by `anchor`.
    ///
    /// # Errors
    ///
    /// Returns an error if the anchor does not resolve.
    pub fn replace(
        &mut self,
        anchor: impl Into<Anchor>,
        middleware: impl Into<Middleware>,
    ) -> Result<&mut Self, BuilderError> {
        let anchor = anchor.into();
        let items = middleware.into().into_items();

        if let Anchor::Index(idx) = anchor {
            self.resolve_existing(&anchor)?;
            self.stack.remove(idx);
            self.splice_at(idx, items);
        } else {
            let idx = self.resolve_existing(&anchor)?;
            let inserted = items.len();
            self.splice_at(idx, items);
            self.stack.remove(idx + inserted);
        }

        Ok(self)
    }

    /// Removes the entry located by `anchor`.
    ///
    /// # Errors
    ///
    /// Returns an error if the anchor does not resolve.
    pub fn delete(&mut self, anchor: impl Into<Anchor>) -> Result<StackItem, BuilderError> {
        let idx = self.resolve_existing(&anchor.into())?;
        Ok(self.stack.remove(idx))
    }

    /// Returns the position of the first entry matching `anchor`.
    #[must_use]
    pub fn index(&self, anchor: &Anchor) -> Option<usize> {
        match anchor {
            Anchor::Index(idx) => (*idx < self.stack.len()).then_some(*idx),
            _ => self.stack.iter().position(|item| item.matches(anchor)),
        }
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Returns true if the builder has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Returns the entries.
    #[must_use]
    pub fn items(&self) -> &[StackItem] {
        &self.stack
    }

    /// Returns the entry names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.stack.iter().map(StackItem::name).collect()
    }

    /// Materializes the builder into a warden for `env`.
    ///
    /// If the environment carries a hook, it is applied to a copy of this
    /// builder; prepend and append directives are skipped when an enclosing
    /// pipeline of the same invocation already applied them. The builder
    /// itself is never modified.
    pub fn to_app(&self, env: &mut Environment) -> Warden {
        let stack = match env.hook() {
            Some(hook) => {
                let options = ApplyOptions {
                    no_prepend_or_append: env.mark_hooks_applied(),
                };
                let mut hooked = self.clone();
                hook.apply(&mut hooked, &options);
                debug!(
                    run_id = %env.run_id(),
                    before = self.len(),
                    after = hooked.len(),
                    no_prepend_or_append = options.no_prepend_or_append,
                    "Applied action hook"
                );
                hooked.stack
            }
            None => self.stack.clone(),
        };

        Warden::new(&stack, env)
    }

    pub(crate) fn into_items(self) -> Vec<StackItem> {
        self.stack
    }

    pub(crate) fn splice_at(&mut self, idx: usize, items: Vec<StackItem>) {
        self.stack.splice(idx..idx, items);
    }

    fn resolve_insert(&self, anchor: &Anchor) -> Result<usize, BuilderError> {
        match anchor {
            Anchor::Index(idx) if *idx <= self.stack.len() => Ok(*idx),
            Anchor::Index(idx) => Err(self.out_of_range(*idx)),
            _ => self.resolve_existing(anchor),
        }
    }

    fn resolve_existing(&self, anchor: &Anchor) -> Result<usize, BuilderError> {
        match anchor {
            Anchor::Index(idx) => self.index(anchor).ok_or_else(|| self.out_of_range(*idx)),
            _ => self.index(anchor).ok_or_else(|| BuilderError::AnchorNotFound {
                anchor: anchor.to_string(),
            }),
        }
    }

    const fn out_of_range(&self, index: usize) -> BuilderError {
        BuilderError::IndexOutOfRange {
            index,
            len: self.stack.len(),
        }
    }
}
