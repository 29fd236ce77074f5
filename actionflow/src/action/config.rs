//! Runner configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a [`Runner`](super::Runner).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Exit code used when a second interrupt forces the process down.
    pub force_exit_code: i32,
    /// Forward OS Ctrl-C to the runner's interrupt source. A Ctrl-C outside
    /// any run goes to the force-abort handler with exit code 130.
    pub listen_for_ctrl_c: bool,
    /// Log the "waiting for cleanup" notice only for the first interrupt
    /// this runner sees.
    pub log_interrupt_once: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            force_exit_code: 1,
            listen_for_ctrl_c: false,
            log_interrupt_once: true,
        }
    }
}

impl RunnerConfig {
    /// Creates a new runner config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the forced exit code.
    #[must_use]
    pub const fn with_force_exit_code(mut self, code: i32) -> Self {
        self.force_exit_code = code;
        self
    }

    /// Enables or disables the Ctrl-C listener.
    #[must_use]
    pub const fn with_ctrl_c(mut self, listen: bool) -> Self {
        self.listen_for_ctrl_c = listen;
        self
    }

    /// Sets whether the interrupt notice is logged only once.
    #[must_use]
    pub const fn with_log_interrupt_once(mut self, once: bool) -> Self {
        self.log_interrupt_once = once;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.force_exit_code, 1);
        assert!(!config.listen_for_ctrl_c);
        assert!(config.log_interrupt_once);
    }

    #[test]
    fn test_builder_methods() {
        let config = RunnerConfig::new()
            .with_force_exit_code(130)
            .with_ctrl_c(true)
            .with_log_interrupt_once(false);

        assert_eq!(config.force_exit_code, 130);
        assert!(config.listen_for_ctrl_c);
        assert!(!config.log_interrupt_once);
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: RunnerConfig =
            serde_json::from_str(r#"{"force_exit_code": 2}"#).unwrap();

        assert_eq!(config.force_exit_code, 2);
        assert!(config.log_interrupt_once);
    }
}
