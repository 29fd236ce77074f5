//! Conditional nested pipelines.

use crate::action::{Action, App, Builder, RecoveryScope, StackItem, Warden};
use crate::environment::Environment;
use crate::errors::ActionError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// Builds the nested pipeline once the condition has run.
pub type Configure = dyn Fn(&Environment, &mut Builder) + Send + Sync;

/// Runs a condition, then a pipeline chosen from its result.
///
/// The condition runs against the shared environment. `configure` then
/// fills a fresh builder based on what the condition left behind. The rest
/// of the enclosing chain slides in after the nested pipeline, so actions
/// placed after `Call` still run inside it and observe its results.
///
/// # Example
///
/// ```rust,ignore
/// let item = Call::item(Builder::build(is_running()), |env, b| {
///     if env.get("result") == Some(&json!(true)) {
///         b.push(graceful_halt());
///     }
/// });
/// ```
pub struct Call {
    condition: Arc<dyn App>,
    configure: Arc<Configure>,
    child: Mutex<Option<RecoveryScope>>,
}

impl Call {
    /// Creates the action.
    pub fn new<C, F>(condition: C, configure: F) -> Self
    where
        C: App + 'static,
        F: Fn(&Environment, &mut Builder) + Send + Sync + 'static,
    {
        Self::from_shared(Arc::new(condition), Arc::new(configure))
    }

    fn from_shared(condition: Arc<dyn App>, configure: Arc<Configure>) -> Self {
        Self {
            condition,
            configure,
            child: Mutex::new(None),
        }
    }

    /// Wraps a new `Call` in a stack item.
    pub fn item<C, F>(condition: C, configure: F) -> StackItem
    where
        C: App + 'static,
        F: Fn(&Environment, &mut Builder) + Send + Sync + 'static,
    {
        let condition: Arc<dyn App> = Arc::new(condition);
        let configure: Arc<Configure> = Arc::new(configure);
        StackItem::with(move |_| Self::from_shared(Arc::clone(&condition), Arc::clone(&configure)))
    }
}

#[async_trait]
impl Action for Call {
    async fn call(&self, env: &mut Environment, app: &mut Warden) -> Result<(), ActionError> {
        self.condition.call(env).await?;

        let mut builder = Builder::new();
        (self.configure)(env, &mut builder);

        let mut child = builder.to_app(env);
        child.append(app.split_off_remaining());

        let result = child.call(env).await;
        *self.child.lock() = Some(child.into_scope());
        result
    }

    async fn recover(&self, env: &mut Environment) {
        let scope = self.child.lock().take();
        if let Some(mut scope) = scope {
            scope.recover(env).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingAction, Recorder, RecordingAction};
    use pretty_assertions::assert_eq;

    fn condition(value: bool) -> Builder {
        Builder::build(StackItem::func("condition", move |env| {
            env.insert("result", serde_json::json!(value));
            Ok(())
        }))
    }

    fn branch(recorder: &Recorder) -> impl Fn(&Environment, &mut Builder) + Send + Sync + 'static {
        let recorder = recorder.clone();
        move |env: &Environment, builder: &mut Builder| {
            if env.get("result") == Some(&serde_json::json!(true)) {
                builder.push(RecordingAction::item("yes", &recorder));
            } else {
                builder.push(RecordingAction::item("no", &recorder));
            }
        }
    }

    #[tokio::test]
    async fn test_branch_follows_condition() {
        let recorder = Recorder::new();
        let builder = Builder::build(Call::item(condition(true), branch(&recorder)));

        builder.call(&mut Environment::new()).await.unwrap();
        assert_eq!(recorder.events(), vec!["yes_in", "yes_out"]);

        recorder.clear();
        let builder = Builder::build(Call::item(condition(false), branch(&recorder)));
        builder.call(&mut Environment::new()).await.unwrap();
        assert_eq!(recorder.events(), vec!["no_in", "no_out"]);
    }

    #[tokio::test]
    async fn test_rest_of_chain_runs_inside_nested_pipeline() {
        let recorder = Recorder::new();
        let builder = Builder::new()
            .with(RecordingAction::item("before", &recorder))
            .with(Call::item(condition(true), branch(&recorder)))
            .with(RecordingAction::item("after", &recorder));

        builder.call(&mut Environment::new()).await.unwrap();

        assert_eq!(
            recorder.events(),
            vec!["before_in", "yes_in", "after_in", "after_out", "yes_out", "before_out"]
        );
    }

    #[tokio::test]
    async fn test_failure_after_call_recovers_every_action_once() {
        let recorder = Recorder::new();
        let builder = Builder::new()
            .with(RecordingAction::item("before", &recorder))
            .with(Call::item(condition(true), branch(&recorder)))
            .with(FailingAction::item("boom", &recorder));

        let mut env = Environment::new();
        let err = builder.call(&mut env).await.unwrap_err();

        assert_eq!(err.kind(), "failed");
        assert_eq!(
            recorder.events(),
            vec![
                "before_in",
                "yes_in",
                "boom_in",
                "recover:yes",
                "recover:boom",
                "recover:before",
            ]
        );
    }

    #[tokio::test]
    async fn test_condition_failure_propagates() {
        let recorder = Recorder::new();
        let failing = Builder::build(StackItem::func("condition", |_| {
            Err(ActionError::failed("condition", "unreachable host"))
        }));
        let builder = Builder::build(Call::item(failing, branch(&recorder)));

        let err = builder.call(&mut Environment::new()).await.unwrap_err();

        assert!(err.to_string().contains("unreachable host"));
        assert!(recorder.is_empty());
    }
}
