use crate::action::AnyAction;
use crate::error::{Error, Rejection};
use crate::execution_result::ExecutionResult;
use crate::promise::PendingSettlement;
use crate::saga::SagaContext;
use futures::FutureExt;
use std::any::{type_name, Any};
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Finds the settlement attached to `action` by the promise middleware.
fn verify(action: &AnyAction, method: &str) -> Result<Arc<PendingSettlement>, Error> {
    if !action.is_trigger() {
        return Err(Error::Argument(format!(
            "{method}: first argument must be a promise trigger action, got {action:?}"
        )));
    }
    action.meta().settlement().cloned().ok_or_else(|| {
        Error::Configuration(format!(
            "{method}: unable to settle `{}`, it seems the promise middleware was not added before the saga middleware",
            action.kind()
        ))
    })
}

/// Like [`verify`], and also checks that the family resolves to `V`.
fn verify_value<V: Any>(action: &AnyAction, method: &str) -> Result<Arc<PendingSettlement>, Error> {
    let settlement = verify(action, method)?;
    match action.meta().promise_actions() {
        Some(actions) if !actions.accepts::<V>() => Err(Error::Argument(format!(
            "{method}: `{}` settles with {}, not {}",
            action.kind(),
            actions.value_type_name(),
            type_name::<V>()
        ))),
        _ => Ok(settlement),
    }
}

/// Runs `executor` and settles the trigger action with its outcome.
///
/// A value (or `Ok`) resolves the promise; an `Err` or a panic rejects it,
/// whether the panic happens while building the future or while polling it. If
/// the routine is cancelled while the executor runs, the promise stays
/// unsettled and [`Error::Cancelled`] is returned.
pub async fn implement_promise_action<V, R, F, Fut>(
    context: &SagaContext,
    action: &AnyAction,
    executor: F,
) -> Result<(), Error>
where
    V: Any + Send + Sync,
    F: FnOnce() -> Fut,
    Fut: Future<Output = R>,
    R: ExecutionResult<V>,
{
    let settlement = verify_value::<V>(action, "implement_promise_action")?;
    let work = async move { executor().await };
    let outcome = context.call(AssertUnwindSafe(work).catch_unwind()).await?;
    match outcome.map(<R as ExecutionResult<V>>::into_outcome) {
        Ok(Ok(value)) => settlement.resolve(Arc::new(value)),
        Ok(Err(rejection)) => settlement.reject(rejection),
        Err(panic) => settlement.reject(Rejection::from_panic(panic)),
    };
    Ok(())
}

/// Resolves the trigger action's promise with `value`.
pub async fn resolve_promise_action<V>(
    context: &SagaContext,
    action: &AnyAction,
    value: V,
) -> Result<(), Error>
where
    V: Any + Send + Sync,
{
    let settlement = verify_value::<V>(action, "resolve_promise_action")?;
    context
        .call(async move { settlement.resolve(Arc::new(value)) })
        .await?;
    Ok(())
}

/// Rejects the trigger action's promise with `error`. Works for any family,
/// whatever its value type.
pub async fn reject_promise_action(
    context: &SagaContext,
    action: &AnyAction,
    error: impl Into<Rejection>,
) -> Result<(), Error> {
    let settlement = verify(action, "reject_promise_action")?;
    let rejection = error.into();
    context
        .call(async move { settlement.reject(rejection) })
        .await?;
    Ok(())
}

/// The settlement routines with the value type of one promise action family.
pub struct Sagas<V> {
    _value: PhantomData<fn(V)>,
}

impl<V> Clone for Sagas<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for Sagas<V> {}

impl<V> Default for Sagas<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for Sagas<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sagas").field("value", &type_name::<V>()).finish()
    }
}

impl<V> Sagas<V> {
    pub const fn new() -> Self {
        Sagas {
            _value: PhantomData,
        }
    }
}

impl<V: Any + Send + Sync> Sagas<V> {
    pub async fn implement<R, F, Fut>(
        &self,
        context: &SagaContext,
        action: &AnyAction,
        executor: F,
    ) -> Result<(), Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
        R: ExecutionResult<V>,
    {
        implement_promise_action::<V, R, F, Fut>(context, action, executor).await
    }

    pub async fn resolve(&self, context: &SagaContext, action: &AnyAction, value: V) -> Result<(), Error> {
        resolve_promise_action(context, action, value).await
    }

    pub async fn reject(
        &self,
        context: &SagaContext,
        action: &AnyAction,
        error: impl Into<Rejection>,
    ) -> Result<(), Error> {
        reject_promise_action(context, action, error).await
    }
}
