use crate::tracing_setup::tracing_init;
use futures_signals::signal::SignalExt;
use saga_promise::*;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

mod tracing_setup;

#[derive(Debug, Clone, Default)]
struct Profile {
    user: Settlement<String>,
}

impl State for Profile {}

#[derive(thiserror::Error, Debug)]
#[error("no user with id {0}")]
struct UserNotFound(u32);

async fn fetch_from_backend(id: u32) -> Result<String, UserNotFound> {
    sleep(Duration::from_millis(100)).await;
    match id {
        1 => Ok("Alice".to_string()),
        _ => Err(UserNotFound(id)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_init()?;

    let fetch_user = promise_action_factory::<String>().simple::<u32>("fetchUser")?;

    let reducer = {
        let fetch_user = fetch_user.clone();
        move |state: Profile, action: &AnyAction| Profile {
            user: state.user.reduce(&fetch_user, action),
        }
    };

    let sagas = SagaMiddleware::new(SagaOptions::new().on_error(|error: &Error| {
        warn!("saga error: {}", error);
    }));
    let store = Store::builder(Profile::default(), reducer)
        .middleware(promise_middleware())
        .middleware(sagas.clone())
        .build();

    tokio::spawn(store.to_signal().for_each(|profile| {
        info!("  Reducer | user: {:?}", profile.user);
        async {}
    }));

    let bound = fetch_user.sagas();
    let ids = fetch_user.clone();
    sagas.take_every(fetch_user.clone(), move |ctx, action| {
        let id = ids.match_payload(&action).copied().unwrap_or_default();
        async move {
            info!("     Saga | fetching user {}", id);
            bound.implement(&ctx, &action, || fetch_from_backend(id)).await
        }
    })?;

    info!("==========================================");
    let name = store.dispatch(fetch_user.trigger(1)).promise::<String>()?.await?;
    info!("   Caller | fetchUser(1) resolved with {:?}", name);

    info!("==========================================");
    match store.dispatch(fetch_user.trigger(42)).promise::<String>()?.await {
        Ok(name) => warn!("   Caller | unexpected user {:?}", name),
        Err(error) => info!("   Caller | fetchUser(42) rejected: {}", error),
    }

    sleep(Duration::from_millis(10)).await;
    info!("==========================================");
    info!("   Caller | final state: {:?}", store.get_state());

    sagas.cancel();
    Ok(())
}
