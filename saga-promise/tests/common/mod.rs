#![allow(dead_code)]

use saga_promise::mock::ActionRecorder;
use saga_promise::*;
use tokio::sync::mpsc;

pub const PROMISE_ACTION: &str = "promiseAction";

/// Payload of a trigger action: tells the saga how to settle it.
#[derive(Clone, Debug, Default)]
pub struct Control {
    pub resolve_value: Option<String>,
    pub reject_message: Option<String>,
}

impl Control {
    pub fn resolve(value: &str) -> Self {
        Control {
            resolve_value: Some(value.to_string()),
            reject_message: None,
        }
    }

    pub fn reject(message: &str) -> Self {
        Control {
            resolve_value: None,
            reject_message: Some(message.to_string()),
        }
    }
}

/// Payloads seen by the reducer, one slot per action of the family.
#[derive(Clone, Debug, Default)]
pub struct TestState {
    pub trigger: Option<Control>,
    pub resolved: Option<String>,
    pub rejected: Option<Rejection>,
}

impl State for TestState {}

pub struct Harness {
    pub store: Store<TestState>,
    pub sagas: SagaMiddleware,
    pub action: PromiseAction<String, Control>,
    pub recorder: ActionRecorder,
    pub errors: mpsc::UnboundedReceiver<Error>,
}

impl Harness {
    pub fn dispatch(&self, control: Control) -> Dispatched {
        self.store.dispatch(self.action.trigger(control))
    }

    /// Waits for the next error a saga routine reported.
    pub async fn next_error(&mut self) -> Option<Error> {
        self.errors.recv().await
    }
}

pub fn setup(with_middleware: bool) -> Harness {
    let action = promise_action_factory::<String>()
        .simple::<Control>(PROMISE_ACTION)
        .unwrap();

    let reducer = {
        let action = action.clone();
        move |state: TestState, incoming: &AnyAction| {
            if let Some(control) = action.match_payload(incoming) {
                return TestState {
                    trigger: Some(control.clone()),
                    ..state
                };
            }
            if let Some(value) = action.resolved().match_payload(incoming) {
                return TestState {
                    resolved: Some(value.clone()),
                    ..state
                };
            }
            if let Some(error) = action.rejected().match_payload(incoming) {
                return TestState {
                    rejected: Some(error.clone()),
                    ..state
                };
            }
            state
        }
    };

    let (tx, errors) = mpsc::unbounded_channel();
    let sagas = SagaMiddleware::new(SagaOptions::new().on_error(move |error: &Error| {
        let _ = tx.send(error.clone());
    }));
    let recorder = ActionRecorder::new();

    let builder = Store::builder(TestState::default(), reducer).middleware(recorder.clone());
    let builder = if with_middleware {
        builder.middleware(promise_middleware())
    } else {
        builder
    };
    let store = builder.middleware(sagas.clone()).build();

    Harness {
        store,
        sagas,
        action,
        recorder,
        errors,
    }
}

/// Settles every trigger action according to its [`Control`] payload.
pub fn settle_by_control(harness: &Harness) {
    let action = harness.action.clone();
    harness
        .sagas
        .take_every(action.clone(), move |ctx, incoming| {
            let bound = action.sagas();
            let control = action.match_payload(&incoming).cloned().unwrap_or_default();
            async move {
                if let Some(message) = control.reject_message {
                    bound.reject(&ctx, &incoming, Rejection::msg(message)).await
                } else {
                    bound
                        .resolve(&ctx, &incoming, control.resolve_value.unwrap_or_default())
                        .await
                }
            }
        })
        .unwrap();
}
