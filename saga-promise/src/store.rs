use crate::action::{ActionCreator, ActionType, AnyAction, Meta, Payload};
use crate::error::{Error, PromiseError};
use crate::promise::{ErasedPromise, Promise};
use crate::State;
use futures::future::{ready, Either, Ready};
use futures_core::stream::Stream;
use futures_signals::signal::{Mutable, MutableSignalCloned, SignalExt, SignalStream};
use pin_project::pin_project;
use std::any::Any;
use std::collections::HashMap;
use std::future::IntoFuture;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tracing::trace;

/// Anything that accepts actions at the top of a dispatch pipeline.
pub trait Dispatch: Send + Sync {
    fn dispatch(&self, action: AnyAction) -> Dispatched;
}

/// What `dispatch` hands back.
///
/// For ordinary actions this is just the action. For trigger actions it is
/// also the pending promise: [`Dispatched::promise`] gives a typed handle,
/// `meta().promise()` the same promise type-erased, and `.await` waits on it
/// directly.
#[derive(Debug, Clone)]
pub struct Dispatched {
    action: AnyAction,
}

impl Dispatched {
    pub fn new(action: AnyAction) -> Self {
        Dispatched { action }
    }

    pub fn action(&self) -> &AnyAction {
        &self.action
    }

    pub fn into_action(self) -> AnyAction {
        self.action
    }

    pub fn meta(&self) -> &Meta {
        self.action.meta()
    }

    pub fn is_promise(&self) -> bool {
        self.action.meta().promise().is_some()
    }

    pub fn promise<V>(&self) -> Result<Promise<V>, Error>
    where
        V: Any + Clone + Send + Sync,
    {
        match self.action.meta().promise() {
            Some(promise) => promise.typed::<V>(),
            None if self.action.is_trigger() => Err(Error::Configuration(format!(
                "dispatch of `{}` returned no promise, is the promise middleware installed?",
                self.action.kind()
            ))),
            None => Err(Error::Argument(format!(
                "`{}` is not a promise trigger action",
                self.action.kind()
            ))),
        }
    }
}

/// Awaiting a `Dispatched` waits for the settlement without naming the value
/// type: a trigger yields its type-erased resolved value or the
/// [`PromiseError`]. Any other action is already complete and yields its own
/// payload.
impl IntoFuture for Dispatched {
    type Output = Result<Payload, PromiseError>;
    type IntoFuture = Either<ErasedPromise, Ready<Result<Payload, PromiseError>>>;

    fn into_future(self) -> Self::IntoFuture {
        match self.action.meta().promise() {
            Some(promise) => Either::Left(promise.clone()),
            None => Either::Right(ready(Ok(Arc::clone(self.action.payload_arc())))),
        }
    }
}

/// A pipeline stage wrapping the rest of the dispatch chain.
///
/// A stage either forwards through `next.run(action)` or swallows the action.
/// Forward the exact instance you want later stages (and sagas) to observe.
pub trait Middleware<S: State>: Send + Sync + 'static {
    /// Called once when the store is built.
    fn attach(&self, _store: &StoreApi<'_, S>) {}

    fn handle(&self, store: &StoreApi<'_, S>, action: AnyAction, next: Next<'_, S>) -> Dispatched;
}

/// The store as seen by a middleware.
pub struct StoreApi<'a, S: State> {
    inner: &'a StoreInner<S>,
}

impl<S: State> StoreApi<'_, S> {
    pub fn get_state(&self) -> S {
        self.inner.state.get_cloned()
    }

    /// Dispatches from the top of the pipeline.
    pub fn dispatch(&self, action: AnyAction) -> Dispatched {
        self.inner.run(0, action)
    }

    /// A handle that dispatches from the top of the pipeline without keeping
    /// the store alive.
    pub fn downgrade(&self) -> Weak<dyn Dispatch> {
        self.inner.me.clone()
    }
}

/// The remainder of the pipeline after the current stage.
pub struct Next<'a, S: State> {
    inner: &'a StoreInner<S>,
    index: usize,
}

impl<S: State> Next<'_, S> {
    pub fn run(self, action: AnyAction) -> Dispatched {
        self.inner.run(self.index, action)
    }
}

pub type Reducer<S> = Arc<dyn Fn(S, &AnyAction) -> S + Send + Sync>;

struct StoreInner<S: State> {
    state: Mutable<S>,
    reducer: Reducer<S>,
    chain: Vec<Arc<dyn Middleware<S>>>,
    me: Weak<dyn Dispatch>,
}

impl<S: State> StoreInner<S> {
    fn run(&self, index: usize, action: AnyAction) -> Dispatched {
        match self.chain.get(index) {
            Some(middleware) => middleware.handle(
                &StoreApi { inner: self },
                action,
                Next {
                    inner: self,
                    index: index + 1,
                },
            ),
            None => self.reduce(action),
        }
    }

    fn reduce(&self, action: AnyAction) -> Dispatched {
        trace!(kind = %action.kind(), "reducing");
        {
            let mut state = self.state.lock_mut();
            let current = (*state).clone();
            *state = (self.reducer)(current, &action);
        }
        Dispatched::new(action)
    }
}

impl<S: State> Dispatch for StoreInner<S> {
    fn dispatch(&self, action: AnyAction) -> Dispatched {
        self.run(0, action)
    }
}

/// Holds the state, the reducer and the middleware chain.
///
/// `dispatch` runs synchronously: every stage sees the action in order and the
/// reducer has applied it before `dispatch` returns.
pub struct Store<S: State> {
    inner: Arc<StoreInner<S>>,
}

impl<S: State> Clone for Store<S> {
    fn clone(&self) -> Self {
        Store {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: State> Store<S> {
    pub fn new<R>(initial_state: S, reducer: R) -> Self
    where
        R: Fn(S, &AnyAction) -> S + Send + Sync + 'static,
    {
        Self::builder(initial_state, reducer).build()
    }

    pub fn builder<R>(initial_state: S, reducer: R) -> StoreBuilder<S>
    where
        R: Fn(S, &AnyAction) -> S + Send + Sync + 'static,
    {
        StoreBuilder {
            initial_state,
            reducer: Arc::new(reducer),
            chain: Vec::new(),
        }
    }

    pub fn dispatch(&self, action: AnyAction) -> Dispatched {
        self.inner.run(0, action)
    }

    pub fn get_state(&self) -> S {
        self.inner.state.get_cloned()
    }

    pub fn to_signal(&self) -> MutableSignalCloned<S> {
        self.inner.state.signal_cloned()
    }

    pub fn to_stream(&self) -> SignalStream<MutableSignalCloned<S>> {
        self.inner.state.signal_cloned().to_stream()
    }

    /// Streams the state until it reaches a state accepted by `test`.
    ///
    /// The stream starts with the current state and then follows changes. The
    /// first state for which `test` returns true is still yielded, after which
    /// the stream ends. Like any signal stream it is lossy: states replaced
    /// before the stream is polled are skipped, so `test` should describe a
    /// condition rather than a single transition.
    ///
    /// ```
    /// use futures::StreamExt;
    /// use saga_promise::{AnyAction, State, Store};
    ///
    /// #[derive(Clone, Default)]
    /// struct Counter(u32);
    ///
    /// impl State for Counter {}
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let store = Store::new(Counter::default(), |state: Counter, _: &AnyAction| Counter(state.0 + 1));
    /// store.dispatch(AnyAction::new("tick", ()));
    ///
    /// let seen = store.watch_until(|state| state.0 >= 1).collect::<Vec<_>>().await;
    /// assert_eq!(seen.len(), 1);
    /// # }
    /// ```
    pub fn watch_until<F>(&self, test: F) -> WatchUntil<S, F>
    where
        F: FnMut(&S) -> bool,
    {
        WatchUntil {
            states: self.to_stream(),
            done: false,
            test,
        }
    }
}

impl<S: State> Dispatch for Store<S> {
    fn dispatch(&self, action: AnyAction) -> Dispatched {
        self.inner.run(0, action)
    }
}

/// Stream returned by [`Store::watch_until`].
#[pin_project(project = WatchUntilProj)]
#[must_use = "Streams do nothing unless polled"]
pub struct WatchUntil<S: State, F> {
    #[pin]
    states: SignalStream<MutableSignalCloned<S>>,
    done: bool,
    test: F,
}

impl<S, F> Stream for WatchUntil<S, F>
where
    S: State,
    F: FnMut(&S) -> bool,
{
    type Item = S;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<S>> {
        let WatchUntilProj { states, done, test } = self.project();
        if *done {
            return Poll::Ready(None);
        }
        let next = futures_core::ready!(states.poll_next(cx));
        *done = next.as_ref().map_or(true, |state| test(state));
        Poll::Ready(next)
    }
}

pub struct StoreBuilder<S: State> {
    initial_state: S,
    reducer: Reducer<S>,
    chain: Vec<Arc<dyn Middleware<S>>>,
}

impl<S: State> StoreBuilder<S> {
    /// Appends a stage. Stages run in the order they were added.
    pub fn middleware<M: Middleware<S>>(mut self, middleware: M) -> Self {
        self.chain.push(Arc::new(middleware));
        self
    }

    pub fn build(self) -> Store<S> {
        let StoreBuilder {
            initial_state,
            reducer,
            chain,
        } = self;
        let inner = Arc::new_cyclic(|me: &Weak<StoreInner<S>>| {
            let me: Weak<dyn Dispatch> = me.clone();
            StoreInner {
                state: Mutable::new(initial_state),
                reducer,
                chain,
                me,
            }
        });
        let api = StoreApi { inner: &inner };
        for middleware in &inner.chain {
            middleware.attach(&api);
        }
        Store { inner }
    }
}

type Case<S> = Box<dyn Fn(S, &AnyAction) -> S + Send + Sync>;

/// Builds a reducer from per-type cases.
///
/// Actions with no case leave the state untouched.
pub struct ReducerBuilder<S: State> {
    cases: HashMap<ActionType, Vec<Case<S>>>,
}

impl<S: State> Default for ReducerBuilder<S> {
    fn default() -> Self {
        ReducerBuilder {
            cases: HashMap::new(),
        }
    }
}

impl<S: State> ReducerBuilder<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn case<P, F>(mut self, creator: &ActionCreator<P>, reducer: F) -> Self
    where
        P: Any + Send + Sync,
        F: Fn(S, &P) -> S + Send + Sync + 'static,
    {
        self.cases
            .entry(creator.kind().clone())
            .or_default()
            .push(Box::new(move |state: S, action: &AnyAction| match action.payload::<P>() {
                Some(payload) => reducer(state, payload),
                None => state,
            }));
        self
    }

    pub fn case_action<F>(mut self, kind: impl Into<ActionType>, reducer: F) -> Self
    where
        F: Fn(S, &AnyAction) -> S + Send + Sync + 'static,
    {
        self.cases.entry(kind.into()).or_default().push(Box::new(reducer));
        self
    }

    pub fn build(self) -> impl Fn(S, &AnyAction) -> S + Send + Sync + 'static {
        let cases = self.cases;
        move |state: S, action: &AnyAction| match cases.get(action.kind()) {
            Some(cases) => cases.iter().fold(state, |state, case| case(state, action)),
            None => state,
        }
    }
}
