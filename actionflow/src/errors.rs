//! Error types for the actionflow framework.
//!
//! Everything that can go wrong while building or running an action pipeline
//! is an [`ActionError`]. Composition mistakes surface as [`BuilderError`] and
//! [`MultiStepError`]; expected business failures are [`DomainError`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// The main error type for action execution.
#[derive(Debug, Error)]
pub enum ActionError {
    /// A step was called without all of its declared inputs.
    #[error("Step '{step}' has unsatisfied requirements: missing inputs [{}]", missing.join(", "))]
    UnsatisfiedRequirements {
        /// The step name.
        step: String,
        /// The input keys that were absent.
        missing: Vec<String>,
    },

    /// A step completed without producing all of its declared outputs.
    #[error("Step '{step}' did not produce outputs [{}]", missing.join(", "))]
    MissingOutputs {
        /// The step name.
        step: String,
        /// The output keys that were absent.
        missing: Vec<String>,
    },

    /// An expected, keyed business failure.
    #[error("{0}")]
    Domain(#[from] DomainError),

    /// The invocation observed the interrupted flag.
    #[error("Action interrupted")]
    Interrupted,

    /// The process is already terminating. Never recovered.
    #[error("Fatal error: {0}")]
    Fatal(String),

    /// The pipeline could not be composed.
    #[error("{0}")]
    Builder(#[from] BuilderError),

    /// A composite step could not be composed.
    #[error("{0}")]
    MultiStep(#[from] MultiStepError),

    /// The runner was asked to run something it cannot resolve.
    #[error("Argument to run must be a callable object or registered action, got '{0}'")]
    UnknownAction(String),

    /// An action failed with a message.
    #[error("Action '{action}' failed: {message}")]
    Failed {
        /// The action name.
        action: String,
        /// The failure message.
        message: String,
    },

    /// Any other error raised by action code.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ActionError {
    /// Creates a failed-action error.
    #[must_use]
    pub fn failed(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            action: action.into(),
            message: message.into(),
        }
    }

    /// Creates a fatal error.
    #[must_use]
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    /// Returns true for errors that skip recovery entirely.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    /// Returns true if this error came from an interrupt.
    #[must_use]
    pub const fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }

    /// Returns the domain key, if this is a domain error.
    #[must_use]
    pub fn domain_key(&self) -> Option<&str> {
        match self {
            Self::Domain(err) => Some(err.key.as_str()),
            _ => None,
        }
    }

    /// Short machine-readable name of the variant.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnsatisfiedRequirements { .. } => "unsatisfied_requirements",
            Self::MissingOutputs { .. } => "missing_outputs",
            Self::Domain(_) => "domain",
            Self::Interrupted => "interrupted",
            Self::Fatal(_) => "fatal",
            Self::Builder(_) => "builder",
            Self::MultiStep(_) => "multi_step",
            Self::UnknownAction(_) => "unknown_action",
            Self::Failed { .. } => "failed",
            Self::Other(_) => "other",
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(self.kind()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));

        match self {
            Self::UnsatisfiedRequirements { step, missing }
            | Self::MissingOutputs { step, missing } => {
                map.insert("step".to_string(), serde_json::json!(step));
                map.insert("missing".to_string(), serde_json::json!(missing));
            }
            Self::Domain(err) => {
                map.insert("key".to_string(), serde_json::json!(err.key));
                map.insert("data".to_string(), serde_json::json!(err.data));
            }
            Self::Failed { action, .. } => {
                map.insert("action".to_string(), serde_json::json!(action));
            }
            _ => {}
        }

        map
    }
}

/// An expected failure carrying a symbolic key and structured data.
///
/// Domain errors are the errors actions raise for conditions a user can fix,
/// such as a port collision or a machine that is not running.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{}", self.render())]
pub struct DomainError {
    /// Symbolic key, e.g. `vm_port_collision`.
    pub key: String,
    /// Data used to format the message.
    #[serde(default)]
    pub data: BTreeMap<String, serde_json::Value>,
    /// Optional human readable message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DomainError {
    /// Creates a new domain error.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            data: BTreeMap::new(),
            message: None,
        }
    }

    /// Adds a data entry.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Sets the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn render(&self) -> String {
        let head = self.message.as_deref().unwrap_or(&self.key);
        if self.data.is_empty() {
            return head.to_string();
        }

        let pairs: Vec<String> = self
            .data
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        format!("{head} ({})", pairs.join(", "))
    }
}

/// Snapshot of the first error captured during an invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedError {
    /// Variant name from [`ActionError::kind`].
    pub kind: String,
    /// Rendered message.
    pub message: String,
    /// Domain key, when the error was a domain error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// When the error was captured.
    pub captured_at: DateTime<Utc>,
}

impl CapturedError {
    /// Captures the given error.
    #[must_use]
    pub fn from_error(error: &ActionError) -> Self {
        Self {
            kind: error.kind().to_string(),
            message: error.to_string(),
            key: error.domain_key().map(String::from),
            captured_at: Utc::now(),
        }
    }
}

/// Errors raised while editing a builder stack.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuilderError {
    /// No stack item matched the anchor.
    #[error("No middleware in the stack matches anchor {anchor}")]
    AnchorNotFound {
        /// The rendered anchor.
        anchor: String,
    },

    /// The index lies outside the stack.
    #[error("Index {index} is out of range for a stack of {len} items")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The stack length.
        len: usize,
    },
}

/// Errors raised while composing a multi-step group.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MultiStepError {
    /// Two steps share a name.
    #[error("Step with name '{0}' already exists")]
    DuplicateStep(String),

    /// A mapping targets an input the step does not declare, or reads an
    /// output the source step does not declare.
    #[error("Mapping from '{from}' to '{to}' fails for step '{step}'")]
    InvalidMapping {
        /// The step being added.
        step: String,
        /// The source variable.
        from: String,
        /// The target input.
        to: String,
    },

    /// A mapping references a step that was never added.
    #[error("Unknown step '{0}'")]
    UnknownStep(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsatisfied_requirements_message() {
        let err = ActionError::UnsatisfiedRequirements {
            step: "boot".to_string(),
            missing: vec!["machine".to_string(), "ui".to_string()],
        };

        assert!(err.to_string().contains("machine, ui"));
        assert_eq!(err.kind(), "unsatisfied_requirements");
    }

    #[test]
    fn test_domain_error_render() {
        let err = DomainError::new("vm_port_collision")
            .with_data("host_port", serde_json::json!(2222));

        assert_eq!(err.to_string(), "vm_port_collision (host_port=2222)");

        let err = err.with_message("Port collision");
        assert!(err.to_string().starts_with("Port collision"));
    }

    #[test]
    fn test_domain_key() {
        let err: ActionError = DomainError::new("vm_not_running").into();
        assert_eq!(err.domain_key(), Some("vm_not_running"));
        assert!(ActionError::Interrupted.domain_key().is_none());
    }

    #[test]
    fn test_fatal_and_interrupted() {
        assert!(ActionError::fatal("exit").is_fatal());
        assert!(!ActionError::Interrupted.is_fatal());
        assert!(ActionError::Interrupted.is_interrupted());
    }

    #[test]
    fn test_to_dict() {
        let err = ActionError::failed("halt", "still running");
        let dict = err.to_dict();

        assert_eq!(dict.get("type").unwrap(), "failed");
        assert_eq!(dict.get("action").unwrap(), "halt");
    }

    #[test]
    fn test_captured_error_keeps_key() {
        let err: ActionError = DomainError::new("vm_port_collision").into();
        let captured = CapturedError::from_error(&err);

        assert_eq!(captured.kind, "domain");
        assert_eq!(captured.key.as_deref(), Some("vm_port_collision"));
    }

    #[test]
    fn test_anyhow_conversion() {
        let err: ActionError = anyhow::anyhow!("disk full").into();
        assert_eq!(err.to_string(), "disk full");
        assert_eq!(err.kind(), "other");
    }
}
