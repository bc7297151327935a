use crate::tracing_setup::tracing_init;
use futures::future::join_all;
use saga_promise::mock::ActionRecorder;
use saga_promise::*;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

mod tracing_setup;

#[derive(Debug, Clone, Default)]
struct Board {
    finished: Vec<String>,
}

impl State for Board {}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_init()?;

    let search = promise_action_factory::<String>().advanced("search", |(query, delay_ms): (&'static str, u64)| {
        Prepared::new(query.to_string()).with_meta(Meta::new().with("delay_ms", delay_ms))
    })?;

    let reducer = {
        let search = search.clone();
        move |state: Board, action: &AnyAction| match search.resolved().match_payload(action) {
            Some(result) => {
                let mut finished = state.finished;
                finished.push(result.clone());
                Board { finished }
            }
            None => state,
        }
    };

    let recorder = ActionRecorder::new();
    let sagas = SagaMiddleware::new(SagaOptions::new().on_error(|error: &Error| {
        warn!("saga error: {}", error);
    }));
    let store = Store::builder(Board::default(), reducer)
        .middleware(promise_middleware())
        .middleware(recorder.clone())
        .middleware(sagas.clone())
        .build();

    let bound = search.sagas();
    let queries = search.clone();
    sagas.take_every(search.clone(), move |ctx, action| {
        let query = queries.match_payload(&action).cloned().unwrap_or_default();
        let delay = action.meta().get("delay_ms").and_then(|value| value.as_u64()).unwrap_or(0);
        let settlement = action.meta().settlement_id();
        async move {
            info!("     Saga | {:?} started as {:?}", query, settlement);
            bound
                .implement(&ctx, &action, || async move {
                    sleep(Duration::from_millis(delay)).await;
                    format!("results for {query}")
                })
                .await
        }
    })?;

    info!("==========================================");
    warn!("Three searches of the same action type are in flight at once.");
    warn!("The slowest is dispatched first, yet each caller gets its own answer.");

    let requests = [("rust", 300), ("tokio", 200), ("saga", 100)];
    let promises = requests
        .iter()
        .map(|&(query, delay)| store.dispatch(search.trigger((query, delay))).promise::<String>())
        .collect::<Result<Vec<_>, _>>()?;

    for ((query, _), result) in requests.iter().zip(join_all(promises).await) {
        info!("   Caller | {:?} -> {:?}", query, result?);
    }

    info!("==========================================");
    info!("  Reducer | completion order: {:?}", store.get_state().finished);
    info!("Recorder | {:?}", recorder.kinds());

    sagas.cancel();
    Ok(())
}
