use saga_promise::*;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

#[derive(Error, Debug)]
#[error("user {0} not found")]
struct NotFound(u32);

#[derive(Clone, Debug, Default)]
struct Profile {
    user: Settlement<String>,
}

impl State for Profile {}

/// Control signal telling the waiting routine how the fetch ends.
#[derive(Clone, Debug)]
enum ControlSignal {
    ResolveValue(String),
    RejectMessage(String),
}

async fn lookup(id: u32) -> Result<String, NotFound> {
    sleep(Duration::from_millis(5)).await;
    match id {
        1 => Ok("Alice".to_string()),
        2 => Ok("Bob".to_string()),
        _ => Err(NotFound(id)),
    }
}

#[tokio::test]
async fn test_fetch_user() {
    let fetch_user = promise_action_factory::<String>().simple::<u32>("fetchUser").unwrap();

    let reducer = {
        let fetch_user = fetch_user.clone();
        move |state: Profile, action: &AnyAction| Profile {
            user: state.user.reduce(&fetch_user, action),
        }
    };
    let sagas = SagaMiddleware::default();
    let store = Store::builder(Profile::default(), reducer)
        .middleware(promise_middleware())
        .middleware(sagas.clone())
        .build();

    let bound = fetch_user.sagas();
    let ids = fetch_user.clone();
    sagas
        .take_every(fetch_user.clone(), move |ctx, action| {
            let id = ids.match_payload(&action).copied().unwrap_or_default();
            async move { bound.implement(&ctx, &action, || lookup(id)).await }
        })
        .unwrap();

    let dispatched = store.dispatch(fetch_user.trigger(1));
    assert!(store.get_state().user.is_pending());
    assert_eq!(dispatched.promise::<String>().unwrap().await, Ok("Alice".to_string()));
    assert_eq!(store.get_state().user, Settlement::resolved("Alice".to_string()));

    let error = store
        .dispatch(fetch_user.trigger(9))
        .promise::<String>()
        .unwrap()
        .await
        .unwrap_err();
    assert_eq!(error.to_string(), "user 9 not found");
    assert!(error.rejection().and_then(|rejection| rejection.downcast_ref::<NotFound>()).is_some());
    assert_eq!(
        store.get_state().user.error().map(Rejection::message).as_deref(),
        Some("user 9 not found")
    );

    sagas.cancel();
}

#[tokio::test]
async fn test_fetch_user_settled_by_control_signal() {
    let fetch_user = promise_action_factory::<String>().simple::<u32>("fetchUser").unwrap();
    let control = ActionCreator::<ControlSignal>::new("control");

    let reducer = {
        let fetch_user = fetch_user.clone();
        move |state: Profile, action: &AnyAction| Profile {
            user: state.user.reduce(&fetch_user, action),
        }
    };
    let sagas = SagaMiddleware::default();
    let store = Store::builder(Profile::default(), reducer)
        .middleware(promise_middleware())
        .middleware(sagas.clone())
        .build();

    let bound = fetch_user.sagas();
    let saga_control = control.clone();
    sagas
        .take_every(fetch_user.clone(), move |mut ctx, action| {
            let control = saga_control.clone();
            async move {
                let signal = ctx.take(&control).await?;
                let signal = control.match_payload(&signal).cloned();
                bound
                    .implement(&ctx, &action, || async move {
                        match signal {
                            Some(ControlSignal::ResolveValue(value)) => Ok(value),
                            Some(ControlSignal::RejectMessage(message)) => Err(Rejection::msg(message)),
                            None => Err(Rejection::msg("malformed control signal")),
                        }
                    })
                    .await
            }
        })
        .unwrap();

    let alice = store.dispatch(fetch_user.trigger(7)).promise::<String>().unwrap();
    store.dispatch(control.create(ControlSignal::ResolveValue("Alice".to_string())));
    assert_eq!(alice.await, Ok("Alice".to_string()));
    assert_eq!(store.get_state().user.value_ref().map(String::as_str), Some("Alice"));

    let missing = store.dispatch(fetch_user.trigger(8)).promise::<String>().unwrap();
    store.dispatch(control.create(ControlSignal::RejectMessage("not found".to_string())));
    let error = missing.await.unwrap_err();
    assert_eq!(error.rejection().map(Rejection::message).as_deref(), Some("not found"));
    let rejected = store.get_state().user.error().cloned();
    assert!(rejected.is_some_and(|rejection| Some(&rejection) == error.rejection()));

    sagas.cancel();
}
