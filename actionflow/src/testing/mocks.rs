//! Mock actions for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::action::{Action, StackItem, Warden};
use crate::environment::Environment;
use crate::errors::ActionError;

/// A shared, ordered log of events.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    pub fn record(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }

    /// Returns a copy of the events.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    /// Returns the number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Returns true if `event` was recorded.
    #[must_use]
    pub fn contains(&self, event: &str) -> bool {
        self.events.lock().iter().any(|e| e == event)
    }

    /// Removes every event.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

/// Records `{label}_in`, continues, then records `{label}_out`.
///
/// Recovery records `recover:{label}`.
#[derive(Debug, Clone)]
pub struct RecordingAction {
    label: String,
    recorder: Recorder,
}

impl RecordingAction {
    /// Creates a recording action.
    #[must_use]
    pub fn new(label: impl Into<String>, recorder: &Recorder) -> Self {
        Self {
            label: label.into(),
            recorder: recorder.clone(),
        }
    }

    /// A stack item named `label` that builds a recording action.
    #[must_use]
    pub fn item(label: impl Into<String>, recorder: &Recorder) -> StackItem {
        let action = Self::new(label, recorder);
        let name = action.label.clone();
        StackItem::with(move |_| action.clone()).named(name)
    }
}

#[async_trait]
impl Action for RecordingAction {
    fn name(&self) -> &str {
        &self.label
    }

    async fn call(&self, env: &mut Environment, app: &mut Warden) -> Result<(), ActionError> {
        self.recorder.record(format!("{}_in", self.label));
        app.call(env).await?;
        self.recorder.record(format!("{}_out", self.label));
        Ok(())
    }

    async fn recover(&self, _env: &mut Environment) {
        self.recorder.record(format!("recover:{}", self.label));
    }
}

/// Records `{label}_in`, then fails with `"{label} failed"`.
#[derive(Debug, Clone)]
pub struct FailingAction {
    label: String,
    recorder: Recorder,
}

impl FailingAction {
    /// Creates a failing action.
    #[must_use]
    pub fn new(label: impl Into<String>, recorder: &Recorder) -> Self {
        Self {
            label: label.into(),
            recorder: recorder.clone(),
        }
    }

    /// A stack item named `label` that builds a failing action.
    #[must_use]
    pub fn item(label: impl Into<String>, recorder: &Recorder) -> StackItem {
        let action = Self::new(label, recorder);
        let name = action.label.clone();
        StackItem::with(move |_| action.clone()).named(name)
    }
}

#[async_trait]
impl Action for FailingAction {
    fn name(&self) -> &str {
        &self.label
    }

    async fn call(&self, _env: &mut Environment, _app: &mut Warden) -> Result<(), ActionError> {
        self.recorder.record(format!("{}_in", self.label));
        Err(ActionError::failed(&self.label, format!("{} failed", self.label)))
    }

    async fn recover(&self, _env: &mut Environment) {
        self.recorder.record(format!("recover:{}", self.label));
    }
}

/// Records `{label}_in` and returns without continuing the chain.
#[derive(Debug, Clone)]
pub struct HaltingAction {
    label: String,
    recorder: Recorder,
}

impl HaltingAction {
    /// Creates a halting action.
    #[must_use]
    pub fn new(label: impl Into<String>, recorder: &Recorder) -> Self {
        Self {
            label: label.into(),
            recorder: recorder.clone(),
        }
    }

    /// A stack item named `label` that builds a halting action.
    #[must_use]
    pub fn item(label: impl Into<String>, recorder: &Recorder) -> StackItem {
        let action = Self::new(label, recorder);
        let name = action.label.clone();
        StackItem::with(move |_| action.clone()).named(name)
    }
}

#[async_trait]
impl Action for HaltingAction {
    fn name(&self) -> &str {
        &self.label
    }

    async fn call(&self, _env: &mut Environment, _app: &mut Warden) -> Result<(), ActionError> {
        self.recorder.record(format!("{}_in", self.label));
        Ok(())
    }

    async fn recover(&self, _env: &mut Environment) {
        self.recorder.record(format!("recover:{}", self.label));
    }
}

/// Sets the interrupted flag, records `{label}_in`, then continues.
#[derive(Debug, Clone)]
pub struct InterruptingAction {
    label: String,
    recorder: Recorder,
}

impl InterruptingAction {
    /// Creates an interrupting action.
    #[must_use]
    pub fn new(label: impl Into<String>, recorder: &Recorder) -> Self {
        Self {
            label: label.into(),
            recorder: recorder.clone(),
        }
    }

    /// A stack item named `label` that builds an interrupting action.
    #[must_use]
    pub fn item(label: impl Into<String>, recorder: &Recorder) -> StackItem {
        let action = Self::new(label, recorder);
        let name = action.label.clone();
        StackItem::with(move |_| action.clone()).named(name)
    }
}

#[async_trait]
impl Action for InterruptingAction {
    fn name(&self) -> &str {
        &self.label
    }

    async fn call(&self, env: &mut Environment, app: &mut Warden) -> Result<(), ActionError> {
        env.interrupt();
        self.recorder.record(format!("{}_in", self.label));
        app.call(env).await
    }

    async fn recover(&self, _env: &mut Environment) {
        self.recorder.record(format!("recover:{}", self.label));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{App, Builder};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_recorder() {
        let recorder = Recorder::new();
        assert!(recorder.is_empty());

        recorder.record("a");
        let shared = recorder.clone();
        shared.record("b");

        assert_eq!(recorder.events(), vec!["a", "b"]);
        assert!(recorder.contains("b"));
        assert_eq!(recorder.len(), 2);

        recorder.clear();
        assert!(shared.is_empty());
    }

    #[tokio::test]
    async fn test_halting_action_short_circuits() {
        let recorder = Recorder::new();
        let builder = Builder::new()
            .with(HaltingAction::item("stop", &recorder))
            .with(RecordingAction::item("never", &recorder));

        builder.call(&mut Environment::new()).await.unwrap();

        assert_eq!(recorder.events(), vec!["stop_in"]);
    }

    #[test]
    fn test_items_are_named_by_label() {
        let recorder = Recorder::new();
        let item = RecordingAction::item("boot", &recorder);

        assert_eq!(item.name(), "boot");
    }
}
