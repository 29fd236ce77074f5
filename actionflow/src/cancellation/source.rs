//! Process-level interrupt source.

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 16;

/// Exit code used when Ctrl-C arrives while no run is in progress.
pub const UNHANDLED_INTERRUPT_EXIT_CODE: i32 = 130;

/// Handler that terminates the process with the given exit code.
pub type ExitHandler = Arc<dyn Fn(i32) + Send + Sync>;

/// Broadcasts interrupt requests to every active busy region.
///
/// A runner owns one source. Interrupts come either from the operating
/// system (see [`InterruptSource::listen_for_ctrl_c`]) or from
/// [`InterruptSource::trigger`].
#[derive(Debug, Clone)]
pub struct InterruptSource {
    sender: broadcast::Sender<()>,
}

impl InterruptSource {
    /// Creates a source with no listeners.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Sends an interrupt to every subscribed busy region.
    ///
    /// Returns the number of regions notified.
    pub fn trigger(&self) -> usize {
        self.sender.send(()).unwrap_or(0)
    }

    /// Subscribes to interrupt requests.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Forwards every Ctrl-C received by the process to this source.
    ///
    /// A Ctrl-C that reaches no busy region exits the process with
    /// [`UNHANDLED_INTERRUPT_EXIT_CODE`], so the process stays stoppable
    /// between runs. Must be called from within a Tokio runtime.
    pub fn listen_for_ctrl_c(&self) -> JoinHandle<()> {
        self.listen_for_ctrl_c_with(Arc::new(|code| std::process::exit(code)))
    }

    /// Like [`InterruptSource::listen_for_ctrl_c`], calling `on_unhandled`
    /// instead of exiting when no busy region is listening.
    pub fn listen_for_ctrl_c_with(&self, on_unhandled: ExitHandler) -> JoinHandle<()> {
        let source = self.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                debug!("Received Ctrl-C");
                source.forward_os_interrupt(&on_unhandled);
            }
        })
    }

    /// Returns false when nothing was listening and `on_unhandled` ran.
    fn forward_os_interrupt(&self, on_unhandled: &ExitHandler) -> bool {
        match self.sender.send(()) {
            Ok(_) => true,
            Err(_) => {
                warn!(
                    exit_code = UNHANDLED_INTERRUPT_EXIT_CODE,
                    "Interrupted outside of any run, exiting"
                );
                on_unhandled(UNHANDLED_INTERRUPT_EXIT_CODE);
                false
            }
        }
    }
}

impl Default for InterruptSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn capture_exit() -> (ExitHandler, Arc<AtomicI32>) {
        let code = Arc::new(AtomicI32::new(0));
        let seen = Arc::clone(&code);
        let handler: ExitHandler = Arc::new(move |exit_code| seen.store(exit_code, Ordering::SeqCst));
        (handler, code)
    }

    #[test]
    fn test_os_interrupt_without_listeners_exits() {
        let source = InterruptSource::new();
        let (handler, code) = capture_exit();

        assert!(!source.forward_os_interrupt(&handler));
        assert_eq!(code.load(Ordering::SeqCst), UNHANDLED_INTERRUPT_EXIT_CODE);
    }

    #[tokio::test]
    async fn test_os_interrupt_reaches_busy_region() {
        let source = InterruptSource::new();
        let mut region = source.subscribe();
        let (handler, code) = capture_exit();

        assert!(source.forward_os_interrupt(&handler));
        assert!(region.recv().await.is_ok());
        assert_eq!(code.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_os_interrupt_after_region_ends_exits() {
        let source = InterruptSource::new();
        let (handler, code) = capture_exit();
        drop(source.subscribe());

        assert!(!source.forward_os_interrupt(&handler));
        assert_eq!(code.load(Ordering::SeqCst), UNHANDLED_INTERRUPT_EXIT_CODE);
    }

    #[test]
    fn test_trigger_without_listeners() {
        let source = InterruptSource::new();
        assert_eq!(source.trigger(), 0);
    }

    #[tokio::test]
    async fn test_trigger_reaches_subscribers() {
        let source = InterruptSource::new();
        let mut first = source.subscribe();
        let mut second = source.subscribe();

        assert_eq!(source.listener_count(), 2);
        assert_eq!(source.trigger(), 2);

        assert!(first.recv().await.is_ok());
        assert!(second.recv().await.is_ok());
    }
}
