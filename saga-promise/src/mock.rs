//! Test doubles for stores built with this crate.

use crate::action::{ActionType, AnyAction, Pattern};
use crate::store::{Dispatched, Middleware, Next, StoreApi};
use crate::State;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Middleware recording every action that reaches it, in order.
///
/// Where it sits in the chain decides what it sees: placed after the promise
/// middleware it records the armed copies of trigger actions.
#[derive(Debug, Clone, Default)]
pub struct ActionRecorder {
    actions: Arc<Mutex<Vec<AnyAction>>>,
}

impl ActionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<AnyAction>> {
        self.actions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn actions(&self) -> Vec<AnyAction> {
        self.lock().clone()
    }

    pub fn kinds(&self) -> Vec<ActionType> {
        self.lock().iter().map(|action| action.kind().clone()).collect()
    }

    pub fn count<P: Pattern>(&self, pattern: P) -> usize {
        self.lock().iter().filter(|action| pattern.matches(action)).count()
    }

    /// Index of the first recorded action matching `pattern`.
    pub fn position<P: Pattern>(&self, pattern: P) -> Option<usize> {
        self.lock().iter().position(|action| pattern.matches(action))
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl<S: State> Middleware<S> for ActionRecorder {
    fn handle(&self, _store: &StoreApi<'_, S>, action: AnyAction, next: Next<'_, S>) -> Dispatched {
        self.lock().push(action.clone());
        next.run(action)
    }
}
