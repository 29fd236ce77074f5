//! Turning expected domain failures into environment state.

use crate::environment::Environment;
use crate::errors::ActionError;
use std::future::Future;
use tracing::debug;

/// Records a domain failure from `result` on the environment.
///
/// Returns `Ok(true)` on success and `Ok(false)` when `result` was a
/// [`ActionError::Domain`], which is stored as the environment's domain
/// error. Any other error is returned unchanged.
///
/// # Errors
///
/// Returns every error that is not a domain error.
pub fn record_domain_error(
    env: &mut Environment,
    result: Result<(), ActionError>,
) -> Result<bool, ActionError> {
    match result {
        Ok(()) => Ok(true),
        Err(ActionError::Domain(err)) => {
            debug!(run_id = %env.run_id(), key = %err.key, "Caught domain error");
            env.set_domain_error(err);
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

/// Runs `operation`, catching domain failures.
///
/// See [`record_domain_error`].
///
/// # Errors
///
/// Returns every error that is not a domain error.
pub fn catch_domain_error<F>(env: &mut Environment, operation: F) -> Result<bool, ActionError>
where
    F: FnOnce(&mut Environment) -> Result<(), ActionError>,
{
    let result = operation(env);
    record_domain_error(env, result)
}

/// Awaits `operation`, catching domain failures.
///
/// `operation` must not borrow the environment. Work that needs it, such as
/// the rest of an action chain, is awaited first and handed to
/// [`record_domain_error`]:
///
/// ```rust,ignore
/// let forwarded = record_domain_error(env, app.call(env).await)?;
/// ```
///
/// # Errors
///
/// Returns every error that is not a domain error.
pub async fn catch_domain_error_async<F>(
    env: &mut Environment,
    operation: F,
) -> Result<bool, ActionError>
where
    F: Future<Output = Result<(), ActionError>> + Send,
{
    let result = operation.await;
    record_domain_error(env, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DomainError;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_success_returns_true() {
        let mut env = Environment::new();

        let ok = assert_ok!(catch_domain_error(&mut env, |_| Ok(())));

        assert!(ok);
        assert!(!env.has_domain_error());
    }

    #[test]
    fn test_domain_error_is_recorded() {
        let mut env = Environment::new();

        let ok = catch_domain_error(&mut env, |_| {
            Err(DomainError::new("vm_not_running").into())
        })
        .unwrap();

        assert!(!ok);
        assert_eq!(env.domain_error().unwrap().key, "vm_not_running");
    }

    #[tokio::test]
    async fn test_async_domain_error_is_recorded() {
        let mut env = Environment::new();
        let ports = vec![8080_u16, 8080];

        let ok = assert_ok!(
            catch_domain_error_async(&mut env, async move {
                if ports[0] == ports[1] {
                    return Err(DomainError::new("forward_port_collision").into());
                }
                Ok(())
            })
            .await
        );

        assert!(!ok);
        assert_eq!(env.domain_error().unwrap().key, "forward_port_collision");
    }

    #[tokio::test]
    async fn test_async_other_errors_pass_through() {
        let mut env = Environment::new();

        let err = assert_err!(
            catch_domain_error_async(&mut env, async { Err(ActionError::failed("boot", "disk")) })
                .await
        );

        assert_eq!(err.kind(), "failed");
        assert!(!env.has_domain_error());
    }

    #[tokio::test]
    async fn test_record_after_awaiting_chain() {
        let mut env = Environment::new();
        let mut chain = crate::action::Builder::build(crate::action::StackItem::func(
            "collide",
            |_| Err(DomainError::new("forward_port_collision").into()),
        ))
        .to_app(&mut env);

        let result = chain.call(&mut env).await;
        let ok = assert_ok!(record_domain_error(&mut env, result));

        assert!(!ok);
        assert!(env.has_domain_error());
    }

    #[test]
    fn test_other_errors_pass_through() {
        let mut env = Environment::new();

        let err = assert_err!(catch_domain_error(&mut env, |_| {
            Err(ActionError::failed("boot", "disk"))
        }));

        assert_eq!(err.kind(), "failed");
        assert!(!env.has_domain_error());
    }
}
