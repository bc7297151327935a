//! Dispatch an action, await its outcome.
//!
//! `saga-promise` bridges promise-style request/response onto an action/reducer
//! store whose side effects live in saga routines. A [`PromiseAction`] bundle
//! builds trigger actions; the [`PromiseMiddleware`] turns every dispatched
//! trigger into a pending [`Promise`]; a saga routine later settles it through
//! [`implement_promise_action`], [`resolve_promise_action`] or
//! [`reject_promise_action`], which also dispatch the `resolved`/`rejected`
//! companion action for reducers to observe.
//!
//! ```no_run
//! use saga_promise::*;
//!
//! #[derive(Clone, Debug, Default)]
//! struct Profile {
//!     name: Settlement<String>,
//! }
//!
//! impl State for Profile {}
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let fetch_user = promise_action_factory::<String>().simple::<u32>("fetchUser")?;
//!
//! let reducer = {
//!     let fetch_user = fetch_user.clone();
//!     move |state: Profile, action: &AnyAction| Profile {
//!         name: state.name.reduce(&fetch_user, action),
//!     }
//! };
//!
//! let sagas = SagaMiddleware::new(SagaOptions::default());
//! let store = Store::builder(Profile::default(), reducer)
//!     .middleware(promise_middleware())
//!     .middleware(sagas.clone())
//!     .build();
//!
//! let bound = fetch_user.sagas();
//! sagas.take_every(fetch_user.clone(), move |ctx, action| async move {
//!     bound.implement(&ctx, &action, || async { "Alice".to_string() }).await
//! })?;
//!
//! let name = store.dispatch(fetch_user.trigger(7)).promise::<String>()?.await?;
//! assert_eq!(name, "Alice");
//! # Ok(())
//! # }
//! ```

mod action;
mod error;
mod execution_result;
mod factory;
mod promise;
mod promise_middleware;
mod saga;
mod settlement_coroutines;
mod settlement_state;
mod store;

pub mod mock;

pub use action::*;
pub use error::*;
pub use execution_result::*;
pub use factory::*;
pub use promise::{ErasedPromise, PendingSettlement, Promise, PromiseActions, SettlementId};
pub use promise_middleware::*;
pub use saga::*;
pub use settlement_coroutines::*;
pub use settlement_state::*;
pub use store::*;

#[cfg(test)]
mod unit_tests;

pub trait State: Clone + Send + Sync + 'static {}
