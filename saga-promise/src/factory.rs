use crate::action::{ActionCreator, ActionType, AnyAction, Meta, Pattern, Prepared};
use crate::error::{Error, Rejection};
use crate::promise::PromiseActions;
use crate::settlement_coroutines::Sagas;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Creates [`PromiseAction`] bundles whose promises resolve to `V`.
pub struct PromiseActionFactory<V> {
    _value: PhantomData<fn() -> V>,
}

pub fn promise_action_factory<V>() -> PromiseActionFactory<V>
where
    V: Any + Clone + Send + Sync,
{
    PromiseActionFactory {
        _value: PhantomData,
    }
}

impl<V> PromiseActionFactory<V>
where
    V: Any + Clone + Send + Sync,
{
    /// A bundle whose trigger takes the payload directly.
    pub fn simple<P>(&self, kind: impl Into<ActionType>) -> Result<PromiseAction<V, P>, Error>
    where
        P: Any + Send + Sync,
    {
        PromiseAction::build(kind.into(), Arc::new(Prepared::<P>::new))
    }

    /// A bundle whose trigger runs `prepare` on its arguments to build the
    /// payload and any extra metadata.
    pub fn advanced<A, P, F>(&self, kind: impl Into<ActionType>, prepare: F) -> Result<PromiseAction<V, P, A>, Error>
    where
        P: Any + Send + Sync,
        F: Fn(A) -> Prepared<P> + Send + Sync + 'static,
    {
        PromiseAction::build(kind.into(), Arc::new(prepare))
    }
}

type Prepare<A, P> = Arc<dyn Fn(A) -> Prepared<P> + Send + Sync>;

/// A trigger action creator with its `resolved`/`rejected` companions and the
/// settlement routines for its value type.
///
/// Trigger actions have type `kind`; the companions have types
/// `kind/resolved` (payload `V`) and `kind/rejected` (payload [`Rejection`]).
pub struct PromiseAction<V, P, A = P> {
    trigger: ActionCreator<P>,
    resolved: ActionCreator<V>,
    rejected: ActionCreator<Rejection>,
    actions: PromiseActions,
    prepare: Prepare<A, P>,
}

impl<V, P, A> PromiseAction<V, P, A>
where
    V: Any + Send + Sync,
    P: Any + Send + Sync,
{
    fn build(kind: ActionType, prepare: Prepare<A, P>) -> Result<Self, Error> {
        if kind.is_empty() {
            return Err(Error::Argument("Type was expected".to_string()));
        }
        let resolved = kind.child("resolved");
        let rejected = kind.child("rejected");
        Ok(PromiseAction {
            actions: PromiseActions::new::<V>(kind.clone(), resolved.clone(), rejected.clone()),
            trigger: ActionCreator::new(kind),
            resolved: ActionCreator::new(resolved),
            rejected: ActionCreator::new(rejected),
            prepare,
        })
    }

    pub fn kind(&self) -> &ActionType {
        self.trigger.kind()
    }

    /// Builds a trigger action. Metadata from the prepare step is kept.
    pub fn trigger(&self, args: A) -> AnyAction {
        let Prepared { payload, meta } = (self.prepare)(args);
        let meta = meta.merge(Meta::new().with_promise_actions(self.actions.clone()));
        AnyAction::from_parts(self.kind().clone(), Arc::new(payload), meta)
    }

    pub fn trigger_creator(&self) -> &ActionCreator<P> {
        &self.trigger
    }

    pub fn resolved(&self) -> &ActionCreator<V> {
        &self.resolved
    }

    pub fn rejected(&self) -> &ActionCreator<Rejection> {
        &self.rejected
    }

    pub fn promise_actions(&self) -> &PromiseActions {
        &self.actions
    }

    pub fn sagas(&self) -> Sagas<V> {
        Sagas::new()
    }

    /// Whether `action` has this bundle's trigger type.
    pub fn matches(&self, action: &AnyAction) -> bool {
        self.trigger.matches(action)
    }

    /// Whether `action` is a trigger action built by this very bundle.
    pub fn is_own(&self, action: &AnyAction) -> bool {
        action
            .meta()
            .promise_actions()
            .is_some_and(|actions| actions.same_family(&self.actions))
    }

    /// The trigger payload if `action` has this bundle's trigger type.
    pub fn match_payload<'a>(&self, action: &'a AnyAction) -> Option<&'a P> {
        self.trigger.match_payload(action)
    }
}

impl<V, P, A> Clone for PromiseAction<V, P, A> {
    fn clone(&self) -> Self {
        PromiseAction {
            trigger: self.trigger.clone(),
            resolved: self.resolved.clone(),
            rejected: self.rejected.clone(),
            actions: self.actions.clone(),
            prepare: Arc::clone(&self.prepare),
        }
    }
}

impl<V, P, A> fmt::Debug for PromiseAction<V, P, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromiseAction")
            .field("trigger", &self.trigger)
            .field("resolved", &self.resolved)
            .field("rejected", &self.rejected)
            .finish()
    }
}

impl<V, P, A> fmt::Display for PromiseAction<V, P, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.trigger, f)
    }
}

impl<V, P, A> Pattern for PromiseAction<V, P, A>
where
    V: Any + Send + Sync,
    P: Any + Send + Sync,
    A: 'static,
{
    fn matches(&self, action: &AnyAction) -> bool {
        PromiseAction::matches(self, action)
    }
}
