//! Units of work with declared inputs and outputs.
//!
//! A [`Step`] declares the parameter keys it needs and the keys it produces.
//! [`call_step`] enforces that contract around the step's `enter` and `exit`
//! hooks. Steps can run on their own, be chained with [`MultiStep`], or be
//! placed in a pipeline through [`StepAction`].

mod adapter;
mod multistep;

pub use adapter::StepAction;
pub use multistep::{MultiStep, Source};

use crate::action::short_type_name;
use crate::errors::ActionError;
use async_trait::async_trait;
use std::collections::HashMap;

/// Parameters passed into and produced by a step.
pub type Params = HashMap<String, serde_json::Value>;

/// A unit of work with declared inputs and outputs.
#[async_trait]
pub trait Step: Send + Sync {
    /// Returns the step name used in errors.
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Keys that must be present in the parameters.
    fn inputs(&self) -> &[&'static str] {
        &[]
    }

    /// Keys that must be present in the result of `enter`.
    fn outputs(&self) -> &[&'static str] {
        &[]
    }

    /// Does the work.
    ///
    /// Returning `None` is treated as returning an empty map.
    async fn enter(&mut self, params: Params) -> Result<Option<Params>, ActionError>;

    /// Cleans up after `enter`, successful or not.
    async fn exit(&mut self, _error: Option<&ActionError>) {}
}

/// Checks that every declared input is present.
///
/// # Errors
///
/// Returns [`ActionError::UnsatisfiedRequirements`] listing absent inputs.
pub fn bind_inputs<S>(step: &S, params: &Params) -> Result<(), ActionError>
where
    S: Step + ?Sized,
{
    let missing: Vec<String> = step
        .inputs()
        .iter()
        .filter(|key| !params.contains_key(**key))
        .map(|key| (*key).to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ActionError::UnsatisfiedRequirements {
            step: step.name().to_string(),
            missing,
        })
    }
}

/// Binds inputs, calls `enter` and checks the declared outputs.
///
/// Does not call `exit`; callers that defer exit use this together with
/// [`exit_step`].
///
/// # Errors
///
/// Returns the binding error, the error from `enter`, or
/// [`ActionError::MissingOutputs`].
pub async fn enter_step<S>(step: &mut S, params: Params) -> Result<Params, ActionError>
where
    S: Step + ?Sized,
{
    bind_inputs(step, &params)?;
    enter_bound(step, params).await
}

/// Calls `enter` on already bound parameters and checks the outputs.
async fn enter_bound<S>(step: &mut S, params: Params) -> Result<Params, ActionError>
where
    S: Step + ?Sized,
{
    let result = step.enter(params).await?.unwrap_or_default();

    let missing: Vec<String> = step
        .outputs()
        .iter()
        .filter(|key| !result.contains_key(**key))
        .map(|key| (*key).to_string())
        .collect();

    if missing.is_empty() {
        Ok(result)
    } else {
        Err(ActionError::MissingOutputs {
            step: step.name().to_string(),
            missing,
        })
    }
}

/// Calls `exit` on a step.
pub async fn exit_step<S>(step: &mut S, error: Option<&ActionError>)
where
    S: Step + ?Sized,
{
    step.exit(error).await;
}

/// Runs a step with its full contract.
///
/// Missing inputs fail before `enter` and skip `exit`. Otherwise `exit`
/// always runs, receiving the error from `enter` or the output check.
///
/// # Errors
///
/// Returns the first error raised by binding, `enter`, or the output check.
pub async fn call_step<S>(step: &mut S, params: Params) -> Result<Params, ActionError>
where
    S: Step + ?Sized,
{
    bind_inputs(step, &params)?;

    let result = enter_bound(step, params).await;
    exit_step(step, result.as_ref().err()).await;
    result
}
