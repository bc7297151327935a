use crate::action::{ActionType, AnyAction, Meta, Payload};
use crate::error::{Error, PromiseError, Rejection};
use crate::store::Dispatch;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::{debug, warn};

static NEXT_SETTLEMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one dispatched trigger action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SettlementId(u64);

impl SettlementId {
    fn next() -> Self {
        SettlementId(NEXT_SETTLEMENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SettlementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The companion action types of one promise action family.
///
/// Its presence in [`Meta`] is what makes an action a trigger action. Only
/// [`PromiseAction`](crate::PromiseAction) bundles can build one.
#[derive(Clone)]
pub struct PromiseActions {
    inner: Arc<Companions>,
}

struct Companions {
    trigger: ActionType,
    resolved: ActionType,
    rejected: ActionType,
    value_type: TypeId,
    value_type_name: &'static str,
}

impl PromiseActions {
    pub(crate) fn new<V: Any>(trigger: ActionType, resolved: ActionType, rejected: ActionType) -> Self {
        PromiseActions {
            inner: Arc::new(Companions {
                trigger,
                resolved,
                rejected,
                value_type: TypeId::of::<V>(),
                value_type_name: type_name::<V>(),
            }),
        }
    }

    pub fn trigger_type(&self) -> &ActionType {
        &self.inner.trigger
    }

    pub fn resolved_type(&self) -> &ActionType {
        &self.inner.resolved
    }

    pub fn rejected_type(&self) -> &ActionType {
        &self.inner.rejected
    }

    pub fn value_type_name(&self) -> &'static str {
        self.inner.value_type_name
    }

    /// Whether both handles were created by the same bundle.
    pub fn same_family(&self, other: &PromiseActions) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn accepts<V: Any>(&self) -> bool {
        self.inner.value_type == TypeId::of::<V>()
    }

    fn resolved_action(&self, value: Payload) -> AnyAction {
        AnyAction::from_parts(self.inner.resolved.clone(), value, Meta::default())
    }

    fn rejected_action(&self, error: Rejection) -> AnyAction {
        AnyAction::new(self.inner.rejected.clone(), error)
    }
}

impl fmt::Debug for PromiseActions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromiseActions")
            .field("resolved", &self.inner.resolved)
            .field("rejected", &self.inner.rejected)
            .field("value", &self.inner.value_type_name)
            .finish()
    }
}

type Outcome = Result<Payload, Rejection>;

/// Resolve/reject closures for one in-flight trigger action.
///
/// Created by the promise middleware, attached to the exact action instance it
/// forwards, and found again by the settlement routines through that instance.
/// The first settlement wins; later calls are ignored.
pub struct PendingSettlement {
    id: SettlementId,
    actions: PromiseActions,
    sender: Mutex<Option<oneshot::Sender<Outcome>>>,
    store: Weak<dyn Dispatch>,
}

impl PendingSettlement {
    pub(crate) fn arm(actions: PromiseActions, store: Weak<dyn Dispatch>) -> (Arc<Self>, ErasedPromise) {
        let id = SettlementId::next();
        let value_type = actions.inner.value_type;
        let (sender, receiver) = oneshot::channel::<Outcome>();
        let settlement = Arc::new(PendingSettlement {
            id,
            actions,
            sender: Mutex::new(Some(sender)),
            store,
        });
        (settlement, ErasedPromise::new(id, value_type, receiver))
    }

    pub fn id(&self) -> SettlementId {
        self.id
    }

    pub fn is_settled(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Fulfills the promise, then dispatches the `resolved` companion action.
    /// Returns `false` if the promise had already settled.
    pub(crate) fn resolve(&self, value: Payload) -> bool {
        let Some(sender) = self.take_sender("resolve") else {
            return false;
        };
        let _ = sender.send(Ok(Arc::clone(&value)));
        debug!(settlement = %self.id, kind = %self.actions.resolved_type(), "promise resolved");
        self.dispatch(self.actions.resolved_action(value));
        true
    }

    /// Rejects the promise, then dispatches the `rejected` companion action.
    /// Returns `false` if the promise had already settled.
    pub(crate) fn reject(&self, error: Rejection) -> bool {
        let Some(sender) = self.take_sender("reject") else {
            return false;
        };
        let _ = sender.send(Err(error.clone()));
        debug!(settlement = %self.id, kind = %self.actions.rejected_type(), %error, "promise rejected");
        self.dispatch(self.actions.rejected_action(error));
        true
    }

    fn take_sender(&self, method: &str) -> Option<oneshot::Sender<Outcome>> {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_none() {
            warn!(settlement = %self.id, method, "promise already settled, ignoring");
        }
        sender
    }

    fn dispatch(&self, action: AnyAction) {
        match self.store.upgrade() {
            Some(store) => {
                store.dispatch(action);
            }
            None => debug!(settlement = %self.id, kind = %action.kind(), "store dropped, companion action discarded"),
        }
    }
}

impl fmt::Debug for PendingSettlement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSettlement")
            .field("id", &self.id)
            .field("actions", &self.actions)
            .field("settled", &self.is_settled())
            .finish()
    }
}

type SharedOutcome = Shared<BoxFuture<'static, Result<Payload, PromiseError>>>;

/// The pending promise of a dispatched trigger action, without its value type.
///
/// Clones share the outcome. Use [`ErasedPromise::typed`] to await the value.
#[derive(Clone)]
pub struct ErasedPromise {
    id: SettlementId,
    value_type: TypeId,
    outcome: SharedOutcome,
}

impl ErasedPromise {
    fn new(id: SettlementId, value_type: TypeId, receiver: oneshot::Receiver<Outcome>) -> Self {
        let outcome = async move {
            match receiver.await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(rejection)) => Err(PromiseError::Rejected(rejection)),
                Err(_) => Err(PromiseError::Abandoned),
            }
        }
        .boxed()
        .shared();
        ErasedPromise {
            id,
            value_type,
            outcome,
        }
    }

    pub fn id(&self) -> SettlementId {
        self.id
    }

    pub fn typed<V>(&self) -> Result<Promise<V>, Error>
    where
        V: Any + Clone + Send + Sync,
    {
        if self.value_type != TypeId::of::<V>() {
            return Err(Error::Argument(format!(
                "promise {} does not resolve to {}",
                self.id,
                type_name::<V>()
            )));
        }
        Ok(Promise {
            inner: self.clone(),
            _value: PhantomData,
        })
    }
}

impl Future for ErasedPromise {
    type Output = Result<Payload, PromiseError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.outcome).poll(cx)
    }
}

impl fmt::Debug for ErasedPromise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedPromise").field("id", &self.id).finish()
    }
}

/// Awaitable outcome of a dispatched trigger action.
///
/// Resolves with the value passed to the settlement routine, or fails with
/// [`PromiseError::Rejected`]. Clones observe the same outcome.
pub struct Promise<V> {
    inner: ErasedPromise,
    _value: PhantomData<fn() -> V>,
}

impl<V> Promise<V> {
    pub fn id(&self) -> SettlementId {
        self.inner.id
    }

    pub fn erased(&self) -> &ErasedPromise {
        &self.inner
    }
}

impl<V> Clone for Promise<V> {
    fn clone(&self) -> Self {
        Promise {
            inner: self.inner.clone(),
            _value: PhantomData,
        }
    }
}

impl<V> fmt::Debug for Promise<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("id", &self.inner.id)
            .field("value", &type_name::<V>())
            .finish()
    }
}

impl<V> Future for Promise<V>
where
    V: Any + Clone + Send + Sync,
{
    type Output = Result<V, PromiseError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx).map(|outcome| {
            let value = outcome?;
            match value.downcast::<V>() {
                Ok(value) => Ok(Arc::unwrap_or_clone(value)),
                Err(_) => Err(PromiseError::Rejected(Rejection::msg(format!(
                    "resolved value is not a {}",
                    type_name::<V>()
                )))),
            }
        })
    }
}
