mod common;

use common::{setup, Control, Harness};
use saga_promise::*;
use std::future::{pending, Future, Ready};
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

#[derive(Error, Debug)]
#[error("lookup failed: {0}")]
struct LookupError(String);

/// Implements every trigger action with `executor`.
fn implement_with<R, F, Fut>(harness: &Harness, executor: F)
where
    F: Fn(Control) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: ExecutionResult<String> + Send + 'static,
{
    let action = harness.action.clone();
    harness
        .sagas
        .take_every(action.clone(), move |ctx, incoming| {
            let bound = action.sagas();
            let executor = executor.clone();
            let control = action.match_payload(&incoming).cloned().unwrap_or_default();
            async move { bound.implement(&ctx, &incoming, move || executor(control)).await }
        })
        .unwrap();
}

#[tokio::test]
async fn test_implement_value() {
    let harness = setup(true);
    implement_with(&harness, |control: Control| async move {
        format!("got {}", control.resolve_value.unwrap_or_default())
    });

    let value = harness
        .dispatch(Control::resolve("it"))
        .promise::<String>()
        .unwrap()
        .await;

    assert_eq!(value, Ok("got it".to_string()));
    assert_eq!(harness.store.get_state().resolved.as_deref(), Some("got it"));
}

#[tokio::test]
async fn test_implement_result() {
    let harness = setup(true);
    implement_with(&harness, |control: Control| async move {
        match control.reject_message {
            Some(message) => Err(LookupError(message)),
            None => Ok("found".to_string()),
        }
    });

    let found = harness.dispatch(Control::default()).promise::<String>().unwrap().await;
    assert_eq!(found, Ok("found".to_string()));

    let missing = harness
        .dispatch(Control::reject("no such user"))
        .promise::<String>()
        .unwrap()
        .await;
    let rejection = missing.unwrap_err().rejection().cloned().unwrap();
    assert_eq!(rejection.message(), "lookup failed: no such user");
    assert!(rejection.downcast_ref::<LookupError>().is_some());

    let state = harness.store.get_state();
    assert_eq!(state.resolved.as_deref(), Some("found"));
    assert!(state.rejected.is_some_and(|error| error.ptr_eq(&rejection)));
}

#[tokio::test]
async fn test_implement_option() {
    let harness = setup(true);
    implement_with(&harness, |control: Control| async move { control.resolve_value });

    let some = harness.dispatch(Control::resolve("x")).promise::<String>().unwrap().await;
    assert_eq!(some, Ok("x".to_string()));

    let none = harness.dispatch(Control::default()).promise::<String>().unwrap().await;
    assert!(none.unwrap_err().is_rejected());
}

#[tokio::test]
async fn test_implement_panic_rejects() {
    let mut harness = setup(true);
    implement_with(&harness, |_control: Control| async move {
        if true {
            panic!("kaboom");
        }
        String::new()
    });

    let result = harness.dispatch(Control::default()).promise::<String>().unwrap().await;

    let rejection = result.unwrap_err().rejection().cloned().unwrap();
    assert!(rejection.message().contains("kaboom"), "{rejection}");
    assert!(harness.store.get_state().rejected.is_some());
    // The routine itself completed normally.
    assert!(harness.errors.try_recv().is_err());
}

#[tokio::test]
async fn test_executor_panicking_before_its_future_rejects() {
    let mut harness = setup(true);
    implement_with(&harness, |_control: Control| -> Ready<String> { panic!("sync boom") });

    let result = timeout(
        Duration::from_millis(500),
        harness.dispatch(Control::default()).promise::<String>().unwrap(),
    )
    .await
    .expect("promise settles");

    let rejection = result.unwrap_err().rejection().cloned().unwrap();
    assert!(rejection.message().contains("sync boom"), "{rejection}");
    let state = harness.store.get_state();
    assert!(state.rejected.is_some_and(|error| error.ptr_eq(&rejection)));
    assert!(harness.errors.try_recv().is_err());
}

#[tokio::test]
async fn test_cancelled_executor_leaves_promise_pending() {
    let mut harness = setup(true);
    implement_with(&harness, |_control: Control| pending::<String>());

    let promise = harness.dispatch(Control::default()).promise::<String>().unwrap();
    tokio::task::yield_now().await;
    harness.sagas.cancel();

    assert!(timeout(Duration::from_millis(50), promise).await.is_err());
    let state = harness.store.get_state();
    assert!(state.resolved.is_none());
    assert!(state.rejected.is_none());
    assert!(harness.errors.try_recv().is_err());
}
