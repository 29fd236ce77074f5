//! Entry point for running pipelines.

use super::{App, Builder, Hooks, Registry, RunnerConfig, StackItem};
use crate::cancellation::{BusyGuard, ExitHandler, InterruptSource};
use crate::environment::{Environment, Options};
use crate::errors::ActionError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Handler invoked when an interrupt arrives while already interrupted, or
/// when Ctrl-C arrives while no run is in progress.
pub type ForceAbort = ExitHandler;

/// What a [`Runner`] can run.
#[derive(Clone)]
pub enum Callable {
    /// A pipeline registered under this name.
    Name(String),
    /// A builder.
    Builder(Builder),
    /// A single item, wrapped in a one-entry builder.
    Item(StackItem),
    /// Anything implementing [`App`].
    App(Arc<dyn App>),
}

impl From<&str> for Callable {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for Callable {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<Builder> for Callable {
    fn from(builder: Builder) -> Self {
        Self::Builder(builder)
    }
}

impl From<StackItem> for Callable {
    fn from(item: StackItem) -> Self {
        Self::Item(item)
    }
}

impl From<Arc<dyn App>> for Callable {
    fn from(app: Arc<dyn App>) -> Self {
        Self::App(app)
    }
}

impl std::fmt::Debug for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(name) => f.debug_tuple("Name").field(name).finish(),
            Self::Builder(builder) => f.debug_tuple("Builder").field(builder).finish(),
            Self::Item(item) => f.debug_tuple("Item").field(item).finish(),
            Self::App(_) => f.write_str("App(..)"),
        }
    }
}

fn exit_process(code: i32) {
    std::process::exit(code);
}

/// Runs pipelines against fresh environments.
///
/// Each run resolves its callable, creates a new [`Environment`] seeded with
/// the caller's options, and executes inside a busy region. While the region
/// is active, the first interrupt sets the environment's interrupted flag so
/// the pipeline stops at the next action boundary and recovers. A second
/// interrupt calls the force-abort handler, which exits the process unless
/// replaced with [`Runner::with_force_abort`].
///
/// With [`RunnerConfig::listen_for_ctrl_c`] set, a Ctrl-C that arrives
/// outside any run also goes to the force-abort handler, so the process
/// stays stoppable between runs and after the runner is dropped. Enable it
/// on at most one runner per process.
pub struct Runner {
    registry: Arc<Registry<Builder>>,
    hooks: Arc<Hooks>,
    config: RunnerConfig,
    interrupts: InterruptSource,
    interrupt_reported: Arc<AtomicBool>,
    force_abort: ForceAbort,
    ctrl_c: Mutex<Option<JoinHandle<()>>>,
}

impl Runner {
    /// Creates a runner with an empty registry and no hooks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            hooks: Arc::new(Hooks::new()),
            config: RunnerConfig::default(),
            interrupts: InterruptSource::new(),
            interrupt_reported: Arc::new(AtomicBool::new(false)),
            force_abort: Arc::new(exit_process),
            ctrl_c: Mutex::new(None),
        }
    }

    /// Uses `registry` to resolve names.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<Registry<Builder>>) -> Self {
        self.registry = registry;
        self
    }

    /// Uses `hooks` for named runs.
    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<Hooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    /// Listens to `source` for interrupts.
    #[must_use]
    pub fn with_interrupt_source(mut self, source: InterruptSource) -> Self {
        self.interrupts = source;
        self
    }

    /// Replaces the handler called on a second interrupt and on a Ctrl-C
    /// outside any run.
    #[must_use]
    pub fn with_force_abort<F>(mut self, handler: F) -> Self
    where
        F: Fn(i32) + Send + Sync + 'static,
    {
        self.force_abort = Arc::new(handler);
        self
    }

    /// Returns the registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<Registry<Builder>> {
        &self.registry
    }

    /// Returns the hooks.
    #[must_use]
    pub const fn hooks(&self) -> &Arc<Hooks> {
        &self.hooks
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Returns the interrupt source.
    #[must_use]
    pub const fn interrupt_source(&self) -> &InterruptSource {
        &self.interrupts
    }

    /// Sends an interrupt to every run in progress.
    pub fn interrupt(&self) -> usize {
        self.interrupts.trigger()
    }

    /// Returns true once this runner has reported an interrupt.
    #[must_use]
    pub fn interrupt_reported(&self) -> bool {
        self.interrupt_reported.load(Ordering::SeqCst)
    }

    /// Runs `callable` against a fresh environment seeded with `options`.
    ///
    /// Returns the environment on success so callers can read what the
    /// pipeline produced.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::UnknownAction`] for unregistered names, and
    /// otherwise whatever error escaped the pipeline.
    pub async fn run(
        &self,
        callable: impl Into<Callable>,
        options: Options,
    ) -> Result<Environment, ActionError> {
        self.ensure_ctrl_c_listener();

        let mut env = Environment::from_options(options);
        let app = self.resolve(callable.into(), &mut env)?;

        info!(
            run_id = %env.run_id(),
            action = env.action_name().unwrap_or("<anonymous>"),
            "Running action"
        );

        let guard = BusyGuard::install(&self.interrupts, self.interrupt_callback(&env));
        let result = app.call(&mut env).await;
        drop(guard);

        result.map(|()| env)
    }

    fn resolve(&self, callable: Callable, env: &mut Environment) -> Result<Arc<dyn App>, ActionError> {
        match callable {
            Callable::Name(name) => {
                let builder = self
                    .registry
                    .get(&name)
                    .ok_or_else(|| ActionError::UnknownAction(name.clone()))?;
                if let Some(hook) = self.hooks.get(&name).filter(|hook| !hook.is_empty()) {
                    env.set_hook(Arc::new(hook));
                }
                env.set_action_name(name);
                Ok(Arc::new(builder))
            }
            Callable::Builder(builder) => Ok(Arc::new(builder)),
            Callable::Item(item) => Ok(Arc::new(Builder::build(item))),
            Callable::App(app) => Ok(app),
        }
    }

    fn interrupt_callback(&self, env: &Environment) -> impl Fn() + Send + Sync + 'static {
        let flag = env.interrupt_flag();
        let run_id = env.run_id();
        let reported = Arc::clone(&self.interrupt_reported);
        let force_abort = Arc::clone(&self.force_abort);
        let exit_code = self.config.force_exit_code;
        let log_once = self.config.log_interrupt_once;

        move || {
            if flag.interrupt() {
                let first_report = !reported.swap(true, Ordering::SeqCst);
                if first_report || !log_once {
                    info!(%run_id, "Waiting for cleanup before exiting...");
                }
            } else {
                warn!(%run_id, exit_code, "Exiting immediately, without cleanup!");
                force_abort(exit_code);
            }
        }
    }

    fn ensure_ctrl_c_listener(&self) {
        if !self.config.listen_for_ctrl_c {
            return;
        }
        let mut listener = self.ctrl_c.lock();
        if listener.is_none() {
            *listener = Some(
                self.interrupts
                    .listen_for_ctrl_c_with(Arc::clone(&self.force_abort)),
            );
        }
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("registry", &self.registry)
            .field("hooks", &self.hooks.len())
            .field("config", &self.config)
            .field("interrupt_reported", &self.interrupt_reported())
            .finish_non_exhaustive()
    }
}
