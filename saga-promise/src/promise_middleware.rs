use crate::action::{AnyAction, Meta};
use crate::promise::PendingSettlement;
use crate::store::{Dispatched, Middleware, Next, StoreApi};
use crate::State;
use tracing::debug;

/// Turns every dispatched trigger action into a pending promise.
///
/// For a trigger action the stage arms a fresh [`PendingSettlement`], forwards
/// a copy of the action carrying it, and returns that copy with the promise
/// attached. Other actions pass through untouched. It must come before the
/// saga middleware so routines receive the armed copy.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromiseMiddleware;

pub fn promise_middleware() -> PromiseMiddleware {
    PromiseMiddleware
}

impl<S: State> Middleware<S> for PromiseMiddleware {
    fn handle(&self, store: &StoreApi<'_, S>, action: AnyAction, next: Next<'_, S>) -> Dispatched {
        let Some(actions) = action.meta().promise_actions().cloned() else {
            return next.run(action);
        };

        let (settlement, promise) = PendingSettlement::arm(actions, store.downgrade());
        debug!(kind = %action.kind(), settlement = %settlement.id(), "trigger action recognized");

        // Each dispatch gets its own copy, so two in-flight dispatches of the
        // same caller value never share a settlement.
        let armed = action.with_meta(Meta::new().with_settlement(settlement));
        next.run(armed.clone());

        Dispatched::new(armed.with_meta(Meta::new().with_promise(promise)))
    }
}
