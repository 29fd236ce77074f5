//! The materialized pipeline.

use super::{Action, StackItem};
use crate::environment::Environment;
use crate::errors::ActionError;
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, error};

/// A constructed action together with its display name.
#[derive(Clone)]
pub struct Finalized {
    name: String,
    action: Arc<dyn Action>,
}

impl Finalized {
    /// Wraps a constructed action.
    pub fn new(action: Arc<dyn Action>) -> Self {
        Self {
            name: action.name().to_string(),
            action,
        }
    }

    /// Returns the action name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the action.
    pub fn action(&self) -> &Arc<dyn Action> {
        &self.action
    }
}

impl std::fmt::Debug for Finalized {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Finalized")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The actions entered during one invocation, in entry order.
///
/// A scope recovers at most once. Once claimed, further recovery requests
/// are no-ops until a new action is entered.
#[derive(Debug, Default)]
pub struct RecoveryScope {
    entered: Vec<Finalized>,
    claimed: bool,
}

impl RecoveryScope {
    /// Creates an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `action` was entered.
    pub fn enter(&mut self, action: Finalized) {
        self.claimed = false;
        self.entered.push(action);
    }

    /// Returns true if the scope has already recovered.
    pub const fn is_claimed(&self) -> bool {
        self.claimed
    }

    /// Returns the number of entered actions awaiting recovery.
    pub fn entered_count(&self) -> usize {
        self.entered.len()
    }

    /// Returns the names of entered actions awaiting recovery.
    pub fn entered_names(&self) -> Vec<&str> {
        self.entered.iter().map(Finalized::name).collect()
    }

    /// Recovers every entered action in entry order, once.
    pub async fn recover(&mut self, env: &mut Environment) {
        if self.claimed {
            return;
        }
        self.claimed = true;

        for entered in std::mem::take(&mut self.entered) {
            debug!(run_id = %env.run_id(), action = entered.name(), "Recovering action");
            entered.action.recover(env).await;
        }
    }
}

/// Lifecycle of a warden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WardenState {
    /// Nothing has run yet.
    Pending,
    /// Actions are running.
    Running,
    /// Every action returned successfully.
    Completed,
    /// A failure is being recovered.
    Recovering,
    /// Recovery finished, or a fatal error passed through.
    Terminal,
}

/// Drives a list of constructed actions as an onion chain.
///
/// Each action receives the warden itself as its continuation: calling
/// [`Warden::call`] from inside an action runs the next action in the queue.
/// When an error escapes any action, the warden records it on the
/// environment, recovers every entered action, and returns the same error.
pub struct Warden {
    actions: VecDeque<Finalized>,
    scope: RecoveryScope,
    state: WardenState,
    depth: usize,
}

impl Warden {
    /// Constructs every item against `env`.
    pub fn new(items: &[StackItem], env: &Environment) -> Self {
        let actions = items
            .iter()
            .map(|item| Finalized::new(item.build(env)))
            .collect();
        Self::from_actions(actions)
    }

    /// Wraps already constructed actions.
    pub fn from_actions(actions: Vec<Finalized>) -> Self {
        Self {
            actions: actions.into(),
            scope: RecoveryScope::new(),
            state: WardenState::Pending,
            depth: 0,
        }
    }

    /// Runs the next action in the queue.
    ///
    /// An empty queue returns `Ok(())`. Interrupts are observed before the
    /// next action is entered and again after it returns.
    pub fn call<'a>(
        &'a mut self,
        env: &'a mut Environment,
    ) -> BoxFuture<'a, Result<(), ActionError>> {
        Box::pin(async move {
            if self.actions.is_empty() {
                if self.depth == 0 && self.state == WardenState::Pending {
                    self.state = WardenState::Completed;
                }
                return Ok(());
            }

            self.depth += 1;
            self.state = WardenState::Running;
            let result = self.advance(env).await;
            self.depth -= 1;

            match result {
                Ok(()) => {
                    if self.depth == 0 && self.state == WardenState::Running {
                        self.state = WardenState::Completed;
                    }
                    Ok(())
                }
                Err(err) if err.is_fatal() => {
                    self.state = WardenState::Terminal;
                    Err(err)
                }
                Err(err) => {
                    if env.record_error(&err) {
                        error!(run_id = %env.run_id(), error = %err, "Error occurred in action pipeline");
                    }
                    self.state = WardenState::Recovering;
                    self.recover(env).await;
                    self.state = WardenState::Terminal;
                    Err(err)
                }
            }
        })
    }

    async fn advance(&mut self, env: &mut Environment) -> Result<(), ActionError> {
        if env.is_interrupted() {
            return Err(ActionError::Interrupted);
        }

        let Some(next) = self.actions.pop_front() else {
            return Ok(());
        };
        let action = Arc::clone(&next.action);
        debug!(run_id = %env.run_id(), action = next.name(), "Calling action");
        self.scope.enter(next);

        action.call(env, self).await?;

        if env.is_interrupted() {
            return Err(ActionError::Interrupted);
        }
        Ok(())
    }

    /// Recovers every entered action once.
    pub async fn recover(&mut self, env: &mut Environment) {
        self.scope.recover(env).await;
    }

    /// Removes and returns the actions not yet entered.
    ///
    /// Used by actions that run the rest of the chain inside a nested
    /// pipeline of their own.
    pub fn split_off_remaining(&mut self) -> Vec<Finalized> {
        self.actions.drain(..).collect()
    }

    /// Appends actions to the end of the queue.
    pub fn append(&mut self, actions: Vec<Finalized>) {
        self.actions.extend(actions);
    }

    /// Returns the number of actions not yet entered.
    pub fn remaining(&self) -> usize {
        self.actions.len()
    }

    /// Returns the names of the actions not yet entered.
    pub fn remaining_names(&self) -> Vec<&str> {
        self.actions.iter().map(Finalized::name).collect()
    }

    /// Returns the number of entered actions awaiting recovery.
    pub fn entered(&self) -> usize {
        self.scope.entered_count()
    }

    /// Returns the current state.
    pub const fn state(&self) -> WardenState {
        self.state
    }

    /// Consumes the warden, returning its recovery scope.
    pub fn into_scope(self) -> RecoveryScope {
        self.scope
    }
}

impl std::fmt::Debug for Warden {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Warden")
            .field("remaining", &self.remaining_names())
            .field("scope", &self.scope)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingAction, Recorder, RecordingAction};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    fn warden(items: &[StackItem]) -> (Warden, Environment) {
        let env = Environment::new();
        (Warden::new(items, &env), env)
    }

    #[tokio::test]
    async fn test_empty_warden_is_ok() {
        let (mut warden, mut env) = warden(&[]);

        assert_eq!(warden.state(), WardenState::Pending);

        warden.call(&mut env).await.unwrap();

        assert_eq!(warden.state(), WardenState::Completed);
        assert!(env.error().is_none());
    }

    #[tokio::test]
    async fn test_onion_order_and_completion() {
        let recorder = Recorder::new();
        let (mut warden, mut env) = warden(&[
            RecordingAction::item("a", &recorder),
            RecordingAction::item("b", &recorder),
        ]);
        assert_eq!(warden.state(), WardenState::Pending);

        warden.call(&mut env).await.unwrap();

        assert_eq!(recorder.events(), vec!["a_in", "b_in", "b_out", "a_out"]);
        assert_eq!(warden.state(), WardenState::Completed);
        assert_eq!(warden.remaining(), 0);
    }

    #[tokio::test]
    async fn test_failure_recovers_entered_in_entry_order() {
        let recorder = Recorder::new();
        let (mut warden, mut env) = warden(&[
            RecordingAction::item("a", &recorder),
            RecordingAction::item("b", &recorder),
            FailingAction::item("c", &recorder),
            RecordingAction::item("d", &recorder),
        ]);

        let err = warden.call(&mut env).await.unwrap_err();

        assert_eq!(err.to_string(), "Action 'c' failed: c failed");
        assert_eq!(
            recorder.events(),
            vec!["a_in", "b_in", "c_in", "recover:a", "recover:b", "recover:c"]
        );
        assert_eq!(warden.state(), WardenState::Terminal);
        assert_eq!(warden.remaining(), 1);
        assert_eq!(env.error().unwrap().kind, "failed");
    }

    #[tokio::test]
    async fn test_recover_runs_once() {
        let recorder = Recorder::new();
        let (mut warden, mut env) = warden(&[
            RecordingAction::item("a", &recorder),
            FailingAction::item("b", &recorder),
        ]);

        warden.call(&mut env).await.unwrap_err();
        warden.recover(&mut env).await;

        let recoveries = recorder
            .events()
            .into_iter()
            .filter(|event| event.starts_with("recover:"))
            .count();
        assert_eq!(recoveries, 2);
    }

    #[tokio::test]
    async fn test_interrupt_before_first_action() {
        let recorder = Recorder::new();
        let (mut warden, mut env) = warden(&[RecordingAction::item("a", &recorder)]);
        env.interrupt();

        let err = warden.call(&mut env).await.unwrap_err();

        assert!(err.is_interrupted());
        assert!(recorder.events().is_empty());
        assert_eq!(warden.entered(), 0);
    }

    #[derive(Default)]
    struct FatalAction;

    #[async_trait]
    impl Action for FatalAction {
        async fn call(&self, _env: &mut Environment, _app: &mut Warden) -> Result<(), ActionError> {
            Err(ActionError::fatal("exit requested"))
        }
    }

    #[tokio::test]
    async fn test_fatal_error_skips_recovery_and_recording() {
        let recorder = Recorder::new();
        let (mut warden, mut env) = warden(&[
            RecordingAction::item("a", &recorder),
            StackItem::action::<FatalAction>(),
        ]);

        let err = warden.call(&mut env).await.unwrap_err();

        assert!(err.is_fatal());
        assert_eq!(recorder.events(), vec!["a_in"]);
        assert!(env.error().is_none());
        assert_eq!(warden.state(), WardenState::Terminal);
    }

    #[tokio::test]
    async fn test_split_off_and_append() {
        let recorder = Recorder::new();
        let (mut warden, mut env) = warden(&[
            RecordingAction::item("a", &recorder),
            RecordingAction::item("b", &recorder),
        ]);

        let rest = warden.split_off_remaining();
        assert_eq!(rest.len(), 2);
        assert_eq!(warden.remaining(), 0);

        warden.append(rest);
        assert_eq!(warden.remaining_names(), vec!["a", "b"]);

        warden.call(&mut env).await.unwrap();
        assert_eq!(recorder.len(), 4);
    }

    #[tokio::test]
    async fn test_scope_reopens_after_new_entry() {
        let recorder = Recorder::new();
        let mut env = Environment::new();
        let mut scope = RecoveryScope::new();

        let first = Finalized::new(RecordingAction::item("a", &recorder).build(&env));
        scope.enter(first);
        scope.recover(&mut env).await;
        assert!(scope.is_claimed());

        let second = Finalized::new(RecordingAction::item("b", &recorder).build(&env));
        scope.enter(second);
        assert!(!scope.is_claimed());
        assert_eq!(scope.entered_names(), vec!["b"]);

        scope.recover(&mut env).await;
        assert_eq!(recorder.events(), vec!["recover:a", "recover:b"]);
    }
}
