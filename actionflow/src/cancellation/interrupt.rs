//! Interrupted flag shared between an environment and its signal handler.

use std::sync::atomic::{AtomicBool, Ordering};

/// A set-once flag marking an invocation as interrupted.
///
/// The flag is written from the busy-region listener task and read by the
/// warden between actions. Once set it is never cleared.
#[derive(Default)]
pub struct InterruptFlag {
    interrupted: AtomicBool,
}

impl InterruptFlag {
    /// Creates a new, unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag.
    ///
    /// Returns true if this call set it, false if it was already set.
    pub fn interrupt(&self) -> bool {
        self.interrupted
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Returns whether the flag has been set.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for InterruptFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptFlag")
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_flag_default_not_interrupted() {
        let flag = InterruptFlag::new();
        assert!(!flag.is_interrupted());
    }

    #[test]
    fn test_flag_first_interrupt_wins() {
        let flag = InterruptFlag::new();

        assert!(flag.interrupt());
        assert!(!flag.interrupt());
        assert!(flag.is_interrupted());
    }

    #[test]
    fn test_flag_across_threads() {
        let flag = Arc::new(InterruptFlag::new());
        let remote = flag.clone();

        std::thread::spawn(move || {
            remote.interrupt();
        })
        .join()
        .unwrap();

        assert!(flag.is_interrupted());
    }
}
