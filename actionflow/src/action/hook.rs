//! Hook directives for injecting middleware into named pipelines.

use super::{Anchor, Builder, Middleware, StackItem};
use dashmap::DashMap;
use tracing::debug;

/// Options for [`Hook::apply`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Skip the prepend and append directives.
    pub no_prepend_or_append: bool,
}

/// A set of insertion directives for one pipeline.
///
/// Directives are recorded in registration order and applied to a builder
/// when it is materialized. `before` and `after` directives target anchors;
/// anchors the builder does not contain are ignored.
#[derive(Debug, Clone, Default)]
pub struct Hook {
    before: Vec<(Anchor, Vec<StackItem>)>,
    after: Vec<(Anchor, Vec<StackItem>)>,
    prepend: Vec<StackItem>,
    append: Vec<StackItem>,
}

impl Hook {
    /// Creates an empty hook.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts middleware before the first builder entry matching `anchor`.
    pub fn before(
        &mut self,
        anchor: impl Into<Anchor>,
        middleware: impl Into<Middleware>,
    ) -> &mut Self {
        add_directive(&mut self.before, anchor.into(), middleware.into().into_items());
        self
    }

    /// Inserts middleware after the first builder entry matching `anchor`.
    pub fn after(
        &mut self,
        anchor: impl Into<Anchor>,
        middleware: impl Into<Middleware>,
    ) -> &mut Self {
        add_directive(&mut self.after, anchor.into(), middleware.into().into_items());
        self
    }

    /// Inserts middleware at the start of the pipeline.
    pub fn prepend(&mut self, middleware: impl Into<Middleware>) -> &mut Self {
        self.prepend.extend(middleware.into().into_items());
        self
    }

    /// Inserts middleware at the end of the pipeline.
    pub fn append(&mut self, middleware: impl Into<Middleware>) -> &mut Self {
        self.append.extend(middleware.into().into_items());
        self
    }

    /// Returns true if the hook has no directives.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.before.is_empty()
            && self.after.is_empty()
            && self.prepend.is_empty()
            && self.append.is_empty()
    }

    /// Applies the directives to `builder`.
    pub fn apply(&self, builder: &mut Builder, options: &ApplyOptions) {
        for (anchor, items) in &self.before {
            if let Some(idx) = builder.index(anchor) {
                builder.splice_at(idx, items.clone());
            } else {
                debug!(anchor = %anchor, "Hook anchor not in pipeline, skipping before");
            }
        }

        for (anchor, items) in &self.after {
            if let Some(idx) = builder.index(anchor) {
                builder.splice_at(idx + 1, items.clone());
            } else {
                debug!(anchor = %anchor, "Hook anchor not in pipeline, skipping after");
            }
        }

        if !options.no_prepend_or_append {
            builder.splice_at(0, self.prepend.clone());
            let end = builder.len();
            builder.splice_at(end, self.append.clone());
        }
    }
}

fn add_directive(directives: &mut Vec<(Anchor, Vec<StackItem>)>, anchor: Anchor, items: Vec<StackItem>) {
    match directives.iter_mut().find(|(existing, _)| *existing == anchor) {
        Some((_, existing)) => existing.extend(items),
        None => directives.push((anchor, items)),
    }
}

/// Hooks keyed by the registry name of the pipeline they apply to.
#[derive(Debug, Default)]
pub struct Hooks {
    hooks: DashMap<String, Hook>,
}

impl Hooks {
    /// Creates an empty hook map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Edits the hook for `name`, creating it if needed.
    pub fn with<F>(&self, name: impl Into<String>, edit: F)
    where
        F: FnOnce(&mut Hook),
    {
        let mut entry = self.hooks.entry(name.into()).or_default();
        edit(entry.value_mut());
    }

    /// Returns a snapshot of the hook for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Hook> {
        self.hooks.get(name).map(|hook| hook.value().clone())
    }

    /// Removes the hook for `name`.
    pub fn remove(&self, name: &str) -> Option<Hook> {
        self.hooks.remove(name).map(|(_, hook)| hook)
    }

    /// Returns the number of hooked names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Returns true if no name is hooked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Removes every hook.
    pub fn clear(&self) {
        self.hooks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn noop(name: &str) -> StackItem {
        StackItem::func(name, |_| Ok(()))
    }

    fn stack() -> Builder {
        Builder::new().with(noop("first")).with(noop("second"))
    }

    #[test]
    fn test_empty_hook() {
        let mut hook = Hook::new();
        assert!(hook.is_empty());

        hook.append(noop("tail"));
        assert!(!hook.is_empty());
    }

    #[test]
    fn test_before_and_after() {
        let mut hook = Hook::new();
        hook.before("second", noop("pre_second"))
            .after("first", noop("post_first"));

        let mut builder = stack();
        hook.apply(&mut builder, &ApplyOptions::default());

        assert_eq!(
            builder.names(),
            vec!["first", "post_first", "pre_second", "second"]
        );
    }

    #[test]
    fn test_only_first_matching_entry_is_anchored() {
        let mut hook = Hook::new();
        hook.before("first", noop("pre")).after("first", noop("post"));

        let mut builder = Builder::new()
            .with(noop("first"))
            .with(noop("second"))
            .with(noop("first"));
        hook.apply(&mut builder, &ApplyOptions::default());

        assert_eq!(
            builder.names(),
            vec!["pre", "first", "post", "second", "first"]
        );
    }

    #[test]
    fn test_missing_anchor_is_skipped() {
        let mut hook = Hook::new();
        hook.before("missing", noop("never")).after("missing", noop("never"));

        let mut builder = stack();
        hook.apply(&mut builder, &ApplyOptions::default());

        assert_eq!(builder.names(), vec!["first", "second"]);
    }

    #[test]
    fn test_registration_order_preserved() {
        let mut hook = Hook::new();
        hook.after("first", noop("a1"))
            .after("first", noop("a2"))
            .before("second", noop("b1"))
            .before("second", noop("b2"))
            .prepend(noop("p1"))
            .prepend(noop("p2"))
            .append(noop("z1"))
            .append(noop("z2"));

        let mut builder = stack();
        hook.apply(&mut builder, &ApplyOptions::default());

        assert_eq!(
            builder.names(),
            vec!["p1", "p2", "first", "a1", "a2", "b1", "b2", "second", "z1", "z2"]
        );
    }

    #[test]
    fn test_no_prepend_or_append() {
        let mut hook = Hook::new();
        hook.prepend(noop("head"))
            .append(noop("tail"))
            .after("first", noop("post_first"));

        let mut builder = stack();
        hook.apply(
            &mut builder,
            &ApplyOptions {
                no_prepend_or_append: true,
            },
        );

        assert_eq!(builder.names(), vec!["first", "post_first", "second"]);
    }

    #[test]
    fn test_builder_middleware_is_flattened() {
        let mut hook = Hook::new();
        hook.append(Builder::new().with(noop("x")).with(noop("y")));

        let mut builder = stack();
        hook.apply(&mut builder, &ApplyOptions::default());

        assert_eq!(builder.names(), vec!["first", "second", "x", "y"]);
    }

    #[test]
    fn test_hooks_map() {
        let hooks = Hooks::new();
        assert!(hooks.is_empty());

        hooks.with("up", |hook| {
            hook.append(noop("tail"));
        });
        hooks.with("up", |hook| {
            hook.prepend(noop("head"));
        });

        assert_eq!(hooks.len(), 1);
        let hook = hooks.get("up").unwrap();
        let mut builder = stack();
        hook.apply(&mut builder, &ApplyOptions::default());
        assert_eq!(builder.names(), vec!["head", "first", "second", "tail"]);

        assert!(hooks.get("halt").is_none());
        assert!(hooks.remove("up").is_some());
        assert!(hooks.is_empty());
    }
}
