use crate::unit_tests::TestState;
use crate::{ActionCreator, AnyAction, Dispatched, Middleware, Next, ReducerBuilder, Store, StoreApi};
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

fn append() -> ActionCreator<String> {
    ActionCreator::new("append")
}

fn log_kinds(state: TestState, action: &AnyAction) -> TestState {
    state.push(action.kind().as_str())
}

struct Tag {
    name: &'static str,
    seen: Arc<Mutex<Vec<&'static str>>>,
}

impl Middleware<TestState> for Tag {
    fn handle(&self, _store: &StoreApi<'_, TestState>, action: AnyAction, next: Next<'_, TestState>) -> Dispatched {
        self.seen.lock().unwrap().push(self.name);
        next.run(action)
    }
}

/// Swallows `drop` actions.
struct Filter;

impl Middleware<TestState> for Filter {
    fn handle(&self, _store: &StoreApi<'_, TestState>, action: AnyAction, next: Next<'_, TestState>) -> Dispatched {
        if action.kind() == "drop" {
            return Dispatched::new(action);
        }
        next.run(action)
    }
}

/// Answers every `ping` with a `pong` dispatched from the top.
struct Echo;

impl Middleware<TestState> for Echo {
    fn handle(&self, store: &StoreApi<'_, TestState>, action: AnyAction, next: Next<'_, TestState>) -> Dispatched {
        let is_ping = action.kind() == "ping";
        let dispatched = next.run(action);
        if is_ping {
            store.dispatch(AnyAction::new("pong", ()));
        }
        dispatched
    }
}

#[test]
fn test_dispatch_reduces_synchronously() {
    let store = Store::new(TestState::default(), log_kinds);

    store.dispatch(AnyAction::new("one", ()));
    assert_eq!(store.get_state().log, vec!["one"]);

    store.dispatch(AnyAction::new("two", ()));
    assert_eq!(store.get_state().log, vec!["one", "two"]);
}

#[test]
fn test_reducer_builder_cases() {
    let append = append();
    let reducer = ReducerBuilder::new()
        .case(&append, |state: TestState, line: &String| state.push(line.as_str()))
        .case_action("clear", |state: TestState, _: &AnyAction| TestState {
            log: Vec::new(),
            ..state
        })
        .build();
    let store = Store::new(TestState::default(), reducer);

    store.dispatch(append.create("a".to_string()));
    store.dispatch(append.create("b".to_string()));
    store.dispatch(AnyAction::new("unknown", ()));
    assert_eq!(store.get_state().log, vec!["a", "b"]);

    // Right type, wrong payload: ignored.
    store.dispatch(AnyAction::new("append", 3_u8));
    assert_eq!(store.get_state().log.len(), 2);

    store.dispatch(AnyAction::new("clear", ()));
    assert!(store.get_state().log.is_empty());
}

#[test]
fn test_middleware_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let store = Store::builder(TestState::default(), log_kinds)
        .middleware(Tag {
            name: "outer",
            seen: Arc::clone(&seen),
        })
        .middleware(Filter)
        .middleware(Tag {
            name: "inner",
            seen: Arc::clone(&seen),
        })
        .build();

    store.dispatch(AnyAction::new("keep", ()));
    store.dispatch(AnyAction::new("drop", ()));

    assert_eq!(*seen.lock().unwrap(), vec!["outer", "inner", "outer"]);
    assert_eq!(store.get_state().log, vec!["keep"]);
}

#[test]
fn test_dispatch_from_middleware() {
    let store = Store::builder(TestState::default(), log_kinds)
        .middleware(Echo)
        .build();

    let dispatched = store.dispatch(AnyAction::new("ping", ()));

    assert_eq!(dispatched.action().kind(), "ping");
    assert!(!dispatched.is_promise());
    assert_eq!(store.get_state().log, vec!["ping", "pong"]);
}

#[tokio::test]
async fn test_watch_until_ends_after_match() {
    let store = Store::new(TestState::default(), log_kinds);

    let writer = store.clone();
    tokio::spawn(async move {
        for _ in 0..3 {
            sleep(Duration::from_millis(5)).await;
            writer.dispatch(AnyAction::new("tick", ()));
        }
    });

    let states = store
        .watch_until(|state| state.log.len() >= 3)
        .collect::<Vec<_>>()
        .await;

    assert!(!states.is_empty());
    assert_eq!(states.last().map(|state| state.log.len()), Some(3));
}

#[tokio::test]
async fn test_watch_until_current_state_matches() {
    let store = Store::new(TestState::default(), log_kinds);
    store.dispatch(AnyAction::new("ready", ()));

    let states = store.watch_until(|state| !state.log.is_empty()).collect::<Vec<_>>().await;

    assert_eq!(states.len(), 1);
    assert_eq!(states[0].log, vec!["ready"]);
}
