use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Misuse of the promise-action machinery.
///
/// These are programmer errors, never business failures. They surface
/// synchronously from the offending call, or inside a saga routine through the
/// saga middleware's error hook. They never travel through a [`Promise`].
///
/// [`Promise`]: crate::Promise
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum Error {
    /// A call site passed something it should not have: an empty action type,
    /// or a non-trigger action handed to a settlement routine.
    #[error("ArgumentError: {0}")]
    Argument(String),

    /// The pipeline is wired wrong: the promise middleware did not run before
    /// the saga middleware.
    #[error("ConfigurationError: {0}")]
    Configuration(String),

    /// The routine was cancelled before the effect completed.
    #[error("Saga was cancelled!")]
    Cancelled,

    /// The store behind a saga routine or settlement has been dropped.
    #[error("Store was dropped!")]
    Detached,
}

impl Error {
    pub fn is_argument(&self) -> bool {
        matches!(self, Error::Argument(_))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    pub fn is_detached(&self) -> bool {
        matches!(self, Error::Detached)
    }
}

/// The reason a promise action was rejected.
///
/// Cheap to clone; every clone refers to the same underlying error, so the
/// value a caller receives from the promise and the payload of the `rejected`
/// companion action compare equal by identity.
#[derive(Clone)]
pub struct Rejection(Arc<dyn StdError + Send + Sync + 'static>);

#[derive(Error, Debug)]
#[error("{0}")]
struct Message(String);

impl Rejection {
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Rejection(Arc::new(error))
    }

    /// A rejection carrying only a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Rejection::new(Message(message.into()))
    }

    pub(crate) fn from_panic(panic: Box<dyn Any + Send>) -> Self {
        let detail = if let Some(text) = panic.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = panic.downcast_ref::<String>() {
            text.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Rejection::msg(format!("executor panicked: {detail}"))
    }

    pub fn message(&self) -> String {
        self.0.to_string()
    }

    pub fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.0.as_ref()
    }

    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    /// Whether both values are clones of the same rejection.
    pub fn ptr_eq(&self, other: &Rejection) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<E> From<E> for Rejection
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Rejection::new(error)
    }
}

impl PartialEq for Rejection {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Rejection {}

impl fmt::Debug for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Rejection").field(&self.0).finish()
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Why awaiting a [`Promise`](crate::Promise) did not produce a value.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum PromiseError {
    /// A saga rejected the trigger action.
    #[error("{0}")]
    Rejected(Rejection),

    /// Every handle to the pending settlement was dropped before anyone
    /// settled it. No companion action is dispatched in this case.
    #[error("Promise was abandoned before it settled!")]
    Abandoned,
}

impl PromiseError {
    pub fn is_rejected(&self) -> bool {
        matches!(self, PromiseError::Rejected(_))
    }

    pub fn is_abandoned(&self) -> bool {
        matches!(self, PromiseError::Abandoned)
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            PromiseError::Rejected(rejection) => Some(rejection),
            PromiseError::Abandoned => None,
        }
    }
}
