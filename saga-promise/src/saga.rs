use crate::action::{AnyAction, Pattern};
use crate::error::Error;
use crate::store::{Dispatch, Dispatched, Middleware, Next, StoreApi};
use crate::State;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

type ErrorHook = Arc<dyn Fn(&Error) + Send + Sync>;

/// Settings for a [`SagaMiddleware`].
#[derive(Clone)]
pub struct SagaOptions {
    channel_capacity: usize,
    on_error: Option<ErrorHook>,
}

impl Default for SagaOptions {
    fn default() -> Self {
        SagaOptions {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            on_error: None,
        }
    }
}

impl SagaOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many recent actions are kept for routines that have not caught up.
    pub fn channel_capacity(self, capacity: usize) -> Self {
        SagaOptions {
            channel_capacity: capacity.max(1),
            ..self
        }
    }

    /// Receives every error a routine returns, except cancellation.
    pub fn on_error<F>(self, hook: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        SagaOptions {
            on_error: Some(Arc::new(hook)),
            ..self
        }
    }
}

impl fmt::Debug for SagaOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SagaOptions")
            .field("channel_capacity", &self.channel_capacity)
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

struct Log {
    base: u64,
    entries: VecDeque<AnyAction>,
    capacity: usize,
}

/// Ordered log of actions that reached the saga middleware.
struct ActionChannel {
    log: Mutex<Log>,
    notify: Notify,
}

impl ActionChannel {
    fn new(capacity: usize) -> Self {
        ActionChannel {
            log: Mutex::new(Log {
                base: 0,
                entries: VecDeque::new(),
                capacity,
            }),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Log> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, action: AnyAction) {
        {
            let mut log = self.lock();
            log.entries.push_back(action);
            if log.entries.len() > log.capacity {
                log.entries.pop_front();
                log.base += 1;
            }
        }
        self.notify.notify_waiters();
    }

    fn head(&self) -> u64 {
        let log = self.lock();
        log.base + log.entries.len() as u64
    }
}

/// A routine's read position in the action log. Clones read independently.
#[derive(Clone)]
struct Cursor {
    channel: Arc<ActionChannel>,
    position: u64,
}

impl Cursor {
    fn try_next(&mut self) -> Option<AnyAction> {
        let log = self.channel.lock();
        if self.position < log.base {
            warn!(skipped = log.base - self.position, "saga fell behind the action channel");
            self.position = log.base;
        }
        let action = log.entries.get((self.position - log.base) as usize).cloned()?;
        self.position += 1;
        Some(action)
    }

    async fn next(&mut self) -> AnyAction {
        let channel = Arc::clone(&self.channel);
        loop {
            // Registered before the check so a publish in between still wakes us.
            let notified = channel.notify.notified();
            if let Some(action) = self.try_next() {
                return action;
            }
            notified.await;
        }
    }
}

struct SagaShared {
    channel: Arc<ActionChannel>,
    on_error: Option<ErrorHook>,
    root: CancellationToken,
    store: OnceLock<Weak<dyn Dispatch>>,
}

impl SagaShared {
    fn report(&self, failure: Error) {
        error!(error = %failure, "saga failed");
        if let Some(hook) = &self.on_error {
            hook(&failure);
        }
    }
}

/// Runs saga routines against the actions flowing through a store.
///
/// As a pipeline stage it forwards every action first and then publishes that
/// same instance to the running routines. Routines are tokio tasks, so
/// [`SagaMiddleware::run`] must be called inside a runtime.
#[derive(Clone)]
pub struct SagaMiddleware {
    shared: Arc<SagaShared>,
}

impl Default for SagaMiddleware {
    fn default() -> Self {
        SagaMiddleware::new(SagaOptions::default())
    }
}

impl SagaMiddleware {
    pub fn new(options: SagaOptions) -> Self {
        SagaMiddleware {
            shared: Arc::new(SagaShared {
                channel: Arc::new(ActionChannel::new(options.channel_capacity)),
                on_error: options.on_error,
                root: CancellationToken::new(),
                store: OnceLock::new(),
            }),
        }
    }

    /// Starts a routine. It sees every action dispatched from now on.
    pub fn run<F, Fut>(&self, routine: F) -> Result<SagaTask, Error>
    where
        F: FnOnce(SagaContext) -> Fut,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        let store = self.shared.store.get().cloned().ok_or_else(|| {
            Error::Configuration(
                "the saga middleware must be added to a store before running sagas".to_string(),
            )
        })?;
        let channel = Arc::clone(&self.shared.channel);
        let position = channel.head();
        let context = SagaContext {
            shared: Arc::clone(&self.shared),
            cursor: Cursor { channel, position },
            token: self.shared.root.child_token(),
            store,
        };
        Ok(spawn(context, routine))
    }

    /// Runs `handler` in its own task for every action matching `pattern`.
    pub fn take_every<P, F, Fut>(&self, pattern: P, handler: F) -> Result<SagaTask, Error>
    where
        P: Pattern + 'static,
        F: Fn(SagaContext, AnyAction) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.run(move |context| context.take_every(pattern, handler))
    }

    /// Cancels every routine started by this middleware.
    pub fn cancel(&self) {
        self.shared.root.cancel();
    }
}

impl<S: State> Middleware<S> for SagaMiddleware {
    fn attach(&self, store: &StoreApi<'_, S>) {
        if self.shared.store.set(store.downgrade()).is_err() {
            warn!("saga middleware added to a second store, keeping the first");
        }
    }

    fn handle(&self, _store: &StoreApi<'_, S>, action: AnyAction, next: Next<'_, S>) -> Dispatched {
        let dispatched = next.run(action.clone());
        trace!(kind = %action.kind(), "publishing to sagas");
        self.shared.channel.publish(action);
        dispatched
    }
}

fn spawn<F, Fut>(context: SagaContext, routine: F) -> SagaTask
where
    F: FnOnce(SagaContext) -> Fut,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    let shared = Arc::clone(&context.shared);
    let token = context.token.clone();
    let scope = token.clone();
    let future = routine(context);
    let handle = tokio::spawn(async move {
        match future.await {
            Ok(()) => trace!("saga finished"),
            Err(Error::Cancelled) => debug!("saga cancelled"),
            Err(failure) => {
                scope.cancel();
                shared.report(failure);
            }
        }
    });
    SagaTask { handle, token }
}

/// Handle to a running routine.
#[derive(Debug)]
pub struct SagaTask {
    handle: JoinHandle<()>,
    token: CancellationToken,
}

impl SagaTask {
    /// Cancels the routine and everything it forked.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    pub async fn join(self) {
        if let Err(join_error) = self.handle.await {
            warn!(error = %join_error, "saga task did not complete");
        }
    }
}

/// The effects available to a saga routine.
///
/// Every effect observes the routine's cancellation token: once cancelled,
/// pending and future effects return [`Error::Cancelled`].
#[derive(Clone)]
pub struct SagaContext {
    shared: Arc<SagaShared>,
    cursor: Cursor,
    token: CancellationToken,
    store: Weak<dyn Dispatch>,
}

impl SagaContext {
    /// Waits for the next action matching `pattern`.
    pub async fn take<P: Pattern>(&mut self, pattern: P) -> Result<AnyAction, Error> {
        loop {
            let action = tokio::select! {
                biased;
                _ = self.token.cancelled() => return Err(Error::Cancelled),
                action = self.cursor.next() => action,
            };
            if pattern.matches(&action) {
                trace!(kind = %action.kind(), "take matched");
                return Ok(action);
            }
        }
    }

    pub fn dispatch(&self, action: AnyAction) -> Result<Dispatched, Error> {
        let store = self.store.upgrade().ok_or(Error::Detached)?;
        Ok(store.dispatch(action))
    }

    /// Invokes `future` and waits for it unless the routine is cancelled first.
    pub async fn call<F: Future>(&self, future: F) -> Result<F::Output, Error> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Error::Cancelled),
            output = future => Ok(output),
        }
    }

    /// Starts a child routine that reads from this routine's current position.
    pub fn fork<F, Fut>(&self, routine: F) -> SagaTask
    where
        F: FnOnce(SagaContext) -> Fut,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        spawn(self.child(), routine)
    }

    /// Forks `handler` for every action matching `pattern`. Never returns
    /// unless cancelled.
    pub async fn take_every<P, F, Fut>(mut self, pattern: P, handler: F) -> Result<(), Error>
    where
        P: Pattern,
        F: Fn(SagaContext, AnyAction) -> Fut,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        loop {
            let action = self.take(&pattern).await?;
            debug!(kind = %action.kind(), "forking handler");
            spawn(self.child(), |context| handler(context, action));
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    fn child(&self) -> SagaContext {
        SagaContext {
            shared: Arc::clone(&self.shared),
            cursor: self.cursor.clone(),
            token: self.token.child_token(),
            store: self.store.clone(),
        }
    }
}

impl fmt::Debug for SagaContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SagaContext")
            .field("position", &self.cursor.position)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}
