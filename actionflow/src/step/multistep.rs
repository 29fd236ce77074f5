//! Chains of steps with remapped parameters.

use super::{enter_step, exit_step, Params, Step};
use crate::errors::{ActionError, MultiStepError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

type StepFactory = Arc<dyn Fn() -> Box<dyn Step> + Send + Sync>;

/// Where a step input gets its value from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    /// A parameter given to the whole group.
    Input(String),
    /// An output of an earlier step in the group.
    Output {
        /// The earlier step's name.
        step: String,
        /// The output key.
        key: String,
    },
    /// The previous step's output of this name, or the group input of this
    /// name for the first step.
    Previous(String),
}

impl Source {
    /// A group input.
    #[must_use]
    pub fn input(key: impl Into<String>) -> Self {
        Self::Input(key.into())
    }

    /// An output of an earlier step.
    #[must_use]
    pub fn output(step: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Output {
            step: step.into(),
            key: key.into(),
        }
    }

    fn variable(&self) -> &str {
        match self {
            Self::Input(key) | Self::Output { key, .. } | Self::Previous(key) => key,
        }
    }
}

struct Entry {
    name: String,
    outputs: Vec<&'static str>,
    factory: StepFactory,
    mappings: Vec<(Source, String)>,
}

/// A step that runs other steps in order.
///
/// Each step's result becomes the next step's parameters. Inputs may be
/// remapped from the group's own parameters or from any earlier step's
/// outputs; inputs without an explicit mapping come from the previous step.
/// Every step that was entered is exited in reverse order once the chain
/// finishes or fails.
#[derive(Default)]
pub struct MultiStep {
    entries: Vec<Entry>,
}

impl MultiStep {
    /// Creates an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `S::default()` under its type name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or a mapping is invalid.
    pub fn step<S>(&mut self, mappings: Vec<(Source, &str)>) -> Result<&mut Self, MultiStepError>
    where
        S: Step + Default + 'static,
    {
        let name = S::default().name().to_string();
        self.named_step(name, S::default, mappings)
    }

    /// Adds the step built by `factory` under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or a mapping is invalid.
    pub fn named_step<S, F>(
        &mut self,
        name: impl Into<String>,
        factory: F,
        mappings: Vec<(Source, &str)>,
    ) -> Result<&mut Self, MultiStepError>
    where
        S: Step + 'static,
        F: Fn() -> S + Send + Sync + 'static,
    {
        let name = name.into();
        if self.entries.iter().any(|entry| entry.name == name) {
            return Err(MultiStepError::DuplicateStep(name));
        }

        let probe = factory();
        let inputs = probe.inputs().to_vec();
        let outputs = probe.outputs().to_vec();

        let mut resolved: Vec<(Source, String)> = mappings
            .into_iter()
            .map(|(from, to)| (from, to.to_string()))
            .collect();
        for input in &inputs {
            if !resolved.iter().any(|(_, to)| to == input) {
                resolved.push((Source::Previous((*input).to_string()), (*input).to_string()));
            }
        }

        let previous = self.entries.last().map(|entry| entry.name.clone());
        let mut mappings = Vec::with_capacity(resolved.len());
        for (from, to) in resolved {
            let from = match (from, &previous) {
                (Source::Previous(key), Some(step)) => Source::Output {
                    step: step.clone(),
                    key,
                },
                (Source::Previous(key), None) => Source::Input(key),
                (from, _) => from,
            };
            self.validate(&name, &inputs, &from, &to)?;
            mappings.push((from, to));
        }

        self.entries.push(Entry {
            name,
            outputs,
            factory: Arc::new(move || Box::new(factory()) as Box<dyn Step>),
            mappings,
        });
        Ok(self)
    }

    /// Returns the step names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.name.as_str()).collect()
    }

    fn validate(
        &self,
        step: &str,
        inputs: &[&'static str],
        from: &Source,
        to: &str,
    ) -> Result<(), MultiStepError> {
        let invalid = || MultiStepError::InvalidMapping {
            step: step.to_string(),
            from: from.variable().to_string(),
            to: to.to_string(),
        };

        if !inputs.iter().any(|input| *input == to) {
            return Err(invalid());
        }

        if let Source::Output { step: source, key } = from {
            let entry = self
                .entries
                .iter()
                .find(|entry| entry.name == *source)
                .ok_or_else(|| MultiStepError::UnknownStep(source.clone()))?;
            if !entry.outputs.iter().any(|output| output == key) {
                return Err(invalid());
            }
        }

        Ok(())
    }

    /// Runs every step in order, returning the last step's result.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by any step.
    pub async fn run(&self, params: Params) -> Result<Params, ActionError> {
        let mut step_outputs: Vec<(&str, Params)> = Vec::with_capacity(self.entries.len());
        let mut entered: Vec<Box<dyn Step>> = Vec::with_capacity(self.entries.len());
        let mut current = params.clone();

        for entry in &self.entries {
            let mut inputs = current;
            for (from, to) in &entry.mappings {
                let value = match from {
                    Source::Input(key) => params.get(key),
                    Source::Output { step, key } => step_outputs
                        .iter()
                        .find(|(name, _)| *name == step)
                        .and_then(|(_, outputs)| outputs.get(key)),
                    Source::Previous(_) => None,
                };
                if let Some(value) = value {
                    inputs.insert(to.clone(), value.clone());
                }
            }

            debug!(step = %entry.name, "Entering step");
            let mut step = (entry.factory)();
            let result = enter_step(step.as_mut(), inputs).await;
            entered.push(step);

            match result {
                Ok(outputs) => {
                    current = outputs.clone();
                    step_outputs.push((entry.name.as_str(), outputs));
                }
                Err(err) => {
                    exit_all(&mut entered, Some(&err)).await;
                    return Err(err);
                }
            }
        }

        exit_all(&mut entered, None).await;
        Ok(current)
    }
}

async fn exit_all(entered: &mut [Box<dyn Step>], error: Option<&ActionError>) {
    for step in entered.iter_mut().rev() {
        exit_step(step.as_mut(), error).await;
    }
}

#[async_trait]
impl Step for MultiStep {
    fn name(&self) -> &str {
        "MultiStep"
    }

    async fn enter(&mut self, params: Params) -> Result<Option<Params>, ActionError> {
        self.run(params).await.map(Some)
    }
}

impl std::fmt::Debug for MultiStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiStep")
            .field("steps", &self.names())
            .finish()
    }
}
