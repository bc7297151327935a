use crate::promise::{ErasedPromise, PendingSettlement, PromiseActions, SettlementId};
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Type-erased action payload. Shared, never deep-copied.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// The type string identifying an action family.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionType(Arc<str>);

impl ActionType {
    pub fn new(kind: impl Into<Arc<str>>) -> Self {
        ActionType(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `<self>/<suffix>`, used for companion action types.
    pub fn child(&self, suffix: &str) -> ActionType {
        ActionType::new(format!("{}/{}", self.0, suffix))
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl From<&str> for ActionType {
    fn from(kind: &str) -> Self {
        ActionType::new(kind)
    }
}

impl From<String> for ActionType {
    fn from(kind: String) -> Self {
        ActionType::new(kind)
    }
}

impl From<&ActionType> for ActionType {
    fn from(kind: &ActionType) -> Self {
        kind.clone()
    }
}

impl PartialEq<str> for ActionType {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for ActionType {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

/// Metadata travelling with an action.
///
/// Caller fields are free-form JSON values. The remaining slots are owned by
/// this crate and can only be filled by it: `promise_actions` marks a trigger
/// action, `settlement` is attached by the promise middleware, and `promise`
/// is set on the value handed back from `dispatch`.
#[derive(Clone, Default)]
pub struct Meta {
    fields: BTreeMap<String, Value>,
    promise_actions: Option<PromiseActions>,
    settlement: Option<Arc<PendingSettlement>>,
    promise: Option<ErasedPromise>,
}

impl Meta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn promise_actions(&self) -> Option<&PromiseActions> {
        self.promise_actions.as_ref()
    }

    /// Identity of the pending settlement attached by the promise middleware.
    pub fn settlement_id(&self) -> Option<SettlementId> {
        self.settlement.as_ref().map(|settlement| settlement.id())
    }

    pub fn promise(&self) -> Option<&ErasedPromise> {
        self.promise.as_ref()
    }

    pub(crate) fn settlement(&self) -> Option<&Arc<PendingSettlement>> {
        self.settlement.as_ref()
    }

    pub(crate) fn with_promise_actions(mut self, actions: PromiseActions) -> Self {
        self.promise_actions = Some(actions);
        self
    }

    pub(crate) fn with_settlement(mut self, settlement: Arc<PendingSettlement>) -> Self {
        self.settlement = Some(settlement);
        self
    }

    pub(crate) fn with_promise(mut self, promise: ErasedPromise) -> Self {
        self.promise = Some(promise);
        self
    }

    /// Combines two metadata blocks. Every field of `self` survives unless
    /// `other` carries the same key, in which case `other` wins.
    pub fn merge(mut self, other: Meta) -> Meta {
        self.fields.extend(other.fields);
        if other.promise_actions.is_some() {
            self.promise_actions = other.promise_actions;
        }
        if other.settlement.is_some() {
            self.settlement = other.settlement;
        }
        if other.promise.is_some() {
            self.promise = other.promise;
        }
        self
    }
}

impl fmt::Debug for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Meta")
            .field("fields", &self.fields)
            .field("promise_actions", &self.promise_actions)
            .field("settlement", &self.settlement_id())
            .field("promise", &self.promise.as_ref().map(|promise| promise.id()))
            .finish()
    }
}

/// An action flowing through the store: a type, a payload and metadata.
///
/// Cloning is shallow. Any change goes through [`AnyAction::with_meta`], which
/// builds a new value and leaves the original untouched.
#[derive(Clone)]
pub struct AnyAction {
    kind: ActionType,
    payload: Payload,
    meta: Meta,
}

impl AnyAction {
    pub fn new<P>(kind: impl Into<ActionType>, payload: P) -> Self
    where
        P: Any + Send + Sync,
    {
        Self::from_parts(kind.into(), Arc::new(payload), Meta::default())
    }

    pub fn from_parts(kind: ActionType, payload: Payload, meta: Meta) -> Self {
        AnyAction {
            kind,
            payload,
            meta,
        }
    }

    pub fn kind(&self) -> &ActionType {
        &self.kind
    }

    pub fn payload<P: Any>(&self) -> Option<&P> {
        self.payload.as_ref().downcast_ref::<P>()
    }

    pub fn payload_arc(&self) -> &Payload {
        &self.payload
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    /// Whether this action was built by a [`PromiseAction`](crate::PromiseAction) bundle.
    pub fn is_trigger(&self) -> bool {
        self.meta.promise_actions.is_some()
    }

    /// A copy of this action with `meta` merged over its metadata.
    pub fn with_meta(&self, meta: Meta) -> AnyAction {
        AnyAction {
            kind: self.kind.clone(),
            payload: Arc::clone(&self.payload),
            meta: self.meta.clone().merge(meta),
        }
    }
}

impl fmt::Debug for AnyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyAction")
            .field("kind", &self.kind)
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

/// Builds actions of one type carrying a `P` payload.
pub struct ActionCreator<P> {
    kind: ActionType,
    _payload: PhantomData<fn(P)>,
}

impl<P> Clone for ActionCreator<P> {
    fn clone(&self) -> Self {
        ActionCreator {
            kind: self.kind.clone(),
            _payload: PhantomData,
        }
    }
}

impl<P> fmt::Debug for ActionCreator<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ActionCreator").field(&self.kind).finish()
    }
}

impl<P> fmt::Display for ActionCreator<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.kind, f)
    }
}

impl<P: Any + Send + Sync> ActionCreator<P> {
    pub fn new(kind: impl Into<ActionType>) -> Self {
        ActionCreator {
            kind: kind.into(),
            _payload: PhantomData,
        }
    }

    pub fn kind(&self) -> &ActionType {
        &self.kind
    }

    pub fn create(&self, payload: P) -> AnyAction {
        AnyAction::new(self.kind.clone(), payload)
    }

    pub fn matches(&self, action: &AnyAction) -> bool {
        action.kind == self.kind
    }

    /// The payload of `action` if it has this creator's type.
    pub fn match_payload<'a>(&self, action: &'a AnyAction) -> Option<&'a P> {
        if self.matches(action) {
            action.payload::<P>()
        } else {
            None
        }
    }
}

/// What a prepare function produces from its arguments.
#[derive(Debug, Clone)]
pub struct Prepared<P> {
    pub payload: P,
    pub meta: Meta,
}

impl<P> Prepared<P> {
    pub fn new(payload: P) -> Self {
        Prepared {
            payload,
            meta: Meta::default(),
        }
    }

    pub fn with_meta(self, meta: Meta) -> Self {
        Prepared { meta, ..self }
    }
}

/// Selects actions for [`SagaContext::take`](crate::SagaContext::take).
pub trait Pattern: Send + Sync {
    fn matches(&self, action: &AnyAction) -> bool;
}

impl Pattern for str {
    fn matches(&self, action: &AnyAction) -> bool {
        action.kind == *self
    }
}

impl Pattern for String {
    fn matches(&self, action: &AnyAction) -> bool {
        action.kind == *self.as_str()
    }
}

impl Pattern for ActionType {
    fn matches(&self, action: &AnyAction) -> bool {
        action.kind == *self
    }
}

impl<P: Any + Send + Sync> Pattern for ActionCreator<P> {
    fn matches(&self, action: &AnyAction) -> bool {
        ActionCreator::matches(self, action)
    }
}

impl<T: Pattern + ?Sized> Pattern for &T {
    fn matches(&self, action: &AnyAction) -> bool {
        (**self).matches(action)
    }
}

impl<T: Pattern + ?Sized> Pattern for Arc<T> {
    fn matches(&self, action: &AnyAction) -> bool {
        (**self).matches(action)
    }
}

/// Matches any action accepted by the wrapped predicate.
pub struct Predicate<F>(pub F);

impl<F> Pattern for Predicate<F>
where
    F: Fn(&AnyAction) -> bool + Send + Sync,
{
    fn matches(&self, action: &AnyAction) -> bool {
        (self.0)(action)
    }
}

/// Matches every action.
#[derive(Debug, Clone, Copy, Default)]
pub struct Wildcard;

impl Pattern for Wildcard {
    fn matches(&self, _action: &AnyAction) -> bool {
        true
    }
}
