//! Stack items, anchors and middleware arguments.

use super::unit::{short_type_name, Action, ActionFn, FnAction};
use super::Builder;
use crate::environment::Environment;
use crate::errors::ActionError;
use regex::Regex;
use std::any::TypeId;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Constructs an action for one materialization of a pipeline.
pub type ActionFactory = Arc<dyn Fn(&Environment) -> Arc<dyn Action> + Send + Sync>;

static NEXT_ITEM_ID: AtomicU64 = AtomicU64::new(1);

/// One entry in a builder stack.
///
/// An item stores a factory captured when it was created, so constructor
/// arguments live inside the closure. Cloning an item shares its factory and
/// keeps its identity.
#[derive(Clone)]
pub struct StackItem {
    id: u64,
    name: String,
    type_id: Option<TypeId>,
    factory: ActionFactory,
}

impl StackItem {
    /// An item constructing `A::default()` on every materialization.
    #[must_use]
    pub fn action<A>() -> Self
    where
        A: Action + Default + 'static,
    {
        Self::with(|_| A::default())
    }

    /// An item constructing its action with `factory`.
    ///
    /// The factory sees the environment the pipeline is materialized for.
    #[must_use]
    pub fn with<A, F>(factory: F) -> Self
    where
        A: Action + 'static,
        F: Fn(&Environment) -> A + Send + Sync + 'static,
    {
        Self::from_parts(
            std::any::type_name::<A>(),
            Some(TypeId::of::<A>()),
            Arc::new(move |env| Arc::new(factory(env)) as Arc<dyn Action>),
        )
    }

    /// An item that reuses one action instance across materializations.
    #[must_use]
    pub fn shared<A>(action: Arc<A>) -> Self
    where
        A: Action + 'static,
    {
        Self::from_parts(
            std::any::type_name::<A>(),
            Some(TypeId::of::<A>()),
            Arc::new(move |_| Arc::clone(&action) as Arc<dyn Action>),
        )
    }

    /// An item wrapping a plain function.
    ///
    /// Calling a function item always continues the chain afterwards.
    #[must_use]
    pub fn func<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut Environment) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        let name = name.into();
        let func: Arc<ActionFn> = Arc::new(func);
        let action_name = name.clone();
        Self::from_parts(
            name,
            None,
            Arc::new(move |_| {
                Arc::new(FnAction::new(action_name.clone(), Arc::clone(&func))) as Arc<dyn Action>
            }),
        )
    }

    /// Builds an item from raw parts.
    #[must_use]
    pub fn from_parts(
        name: impl Into<String>,
        type_id: Option<TypeId>,
        factory: ActionFactory,
    ) -> Self {
        Self {
            id: NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            type_id,
            factory,
        }
    }

    /// Overrides the item's name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns the unique identity of this item.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Returns the item's full name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the last path segment of the item's name.
    #[must_use]
    pub fn short_name(&self) -> &str {
        short_type_name(&self.name)
    }

    /// Returns the action type, for items built from a type.
    #[must_use]
    pub const fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    /// Returns true if this item matches a non-index anchor.
    #[must_use]
    pub fn matches(&self, anchor: &Anchor) -> bool {
        match anchor {
            Anchor::Index(_) => false,
            Anchor::Item(id) => self.id == *id,
            Anchor::Action(type_id) => self.type_id == Some(*type_id),
            Anchor::Name(name) => name_matches(&self.name, name),
        }
    }

    pub(crate) fn build(&self, env: &Environment) -> Arc<dyn Action> {
        (self.factory)(env)
    }
}

impl fmt::Debug for StackItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackItem")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Locates an entry in a builder stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Anchor {
    /// A position in the stack.
    Index(usize),
    /// A specific stack item, by identity.
    Item(u64),
    /// Any item built from this action type.
    Action(TypeId),
    /// Any item whose name matches, in path or snake case form.
    Name(String),
}

impl Anchor {
    /// Anchors on items built from `A`.
    #[must_use]
    pub fn of<A: 'static>() -> Self {
        Self::Action(TypeId::of::<A>())
    }

    /// Anchors on items with the given name.
    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(idx) => write!(f, "index {idx}"),
            Self::Item(id) => write!(f, "item #{id}"),
            Self::Action(type_id) => write!(f, "action {type_id:?}"),
            Self::Name(name) => write!(f, "'{name}'"),
        }
    }
}

impl From<usize> for Anchor {
    fn from(idx: usize) -> Self {
        Self::Index(idx)
    }
}

impl From<&str> for Anchor {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for Anchor {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<&StackItem> for Anchor {
    fn from(item: &StackItem) -> Self {
        Self::Item(item.id)
    }
}

/// Something that can be added to a builder.
#[derive(Debug, Clone)]
pub enum Middleware {
    /// A single item.
    Item(StackItem),
    /// A list of items, spliced in order.
    Items(Vec<StackItem>),
    /// A builder, flattened into its items.
    Builder(Builder),
}

impl Middleware {
    pub(crate) fn into_items(self) -> Vec<StackItem> {
        match self {
            Self::Item(item) => vec![item],
            Self::Items(items) => items,
            Self::Builder(builder) => builder.into_items(),
        }
    }
}

impl From<StackItem> for Middleware {
    fn from(item: StackItem) -> Self {
        Self::Item(item)
    }
}

impl From<Vec<StackItem>> for Middleware {
    fn from(items: Vec<StackItem>) -> Self {
        Self::Items(items)
    }
}

impl From<Builder> for Middleware {
    fn from(builder: Builder) -> Self {
        Self::Builder(builder)
    }
}

impl From<&Builder> for Middleware {
    fn from(builder: &Builder) -> Self {
        Self::Builder(builder.clone())
    }
}

/// Converts `CamelCase` to `snake_case`.
fn snake_case(segment: &str) -> String {
    static BOUNDARIES: OnceLock<(Regex, Regex)> = OnceLock::new();
    let (acronym, word) = BOUNDARIES.get_or_init(|| {
        (
            Regex::new(r"([A-Z]+)([A-Z][a-z])").expect("valid acronym boundary regex"),
            Regex::new(r"([a-z\d])([A-Z])").expect("valid word boundary regex"),
        )
    });
    let spaced = acronym.replace_all(segment, "${1}_${2}");
    word.replace_all(&spaced, "${1}_${2}").to_lowercase()
}

/// Checks `wanted` against every path suffix of `full`, in both the
/// `A::B::C` form and the `a_b_c` form.
fn name_matches(full: &str, wanted: &str) -> bool {
    if full == wanted {
        return true;
    }

    let base = full.split('<').next().unwrap_or(full);
    let segments: Vec<&str> = base.split("::").filter(|s| !s.is_empty()).collect();

    (0..segments.len()).any(|start| {
        let suffix = &segments[start..];
        suffix.join("::") == wanted
            || suffix
                .iter()
                .map(|segment| snake_case(segment))
                .collect::<Vec<_>>()
                .join("_")
                == wanted
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("ActionTest"), "action_test");
        assert_eq!(snake_case("SSHRun"), "ssh_run");
        assert_eq!(snake_case("already_snake"), "already_snake");
    }

    #[test]
    fn test_name_matches_path_and_snake_forms() {
        let full = "my_plugin::test::ActionTest";

        assert!(name_matches(full, "ActionTest"));
        assert!(name_matches(full, "test::ActionTest"));
        assert!(name_matches(full, "my_plugin::test::ActionTest"));
        assert!(name_matches(full, "action_test"));
        assert!(name_matches(full, "test_action_test"));
        assert!(name_matches(full, "my_plugin_test_action_test"));
        assert!(!name_matches(full, "Action"));
        assert!(!name_matches(full, "other_action_test"));
    }

    #[test]
    fn test_func_items_have_distinct_identity() {
        let first = StackItem::func("noop", |_| Ok(()));
        let second = StackItem::func("noop", |_| Ok(()));

        assert_ne!(first.id(), second.id());
        assert!(first.matches(&Anchor::from(&first)));
        assert!(!second.matches(&Anchor::from(&first)));
        assert!(first.matches(&Anchor::name("noop")));
        assert!(first.type_id().is_none());
    }

    #[test]
    fn test_clone_keeps_identity() {
        let item = StackItem::func("noop", |_| Ok(()));
        let copy = item.clone();

        assert_eq!(item.id(), copy.id());
    }

    #[test]
    fn test_anchor_display() {
        assert_eq!(Anchor::Index(2).to_string(), "index 2");
        assert_eq!(Anchor::name("Boot").to_string(), "'Boot'");
    }
}
