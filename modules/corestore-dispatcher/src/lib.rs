//! Central action dispatcher for corestore.
//!
//! Stores register an `ActionHandler`; every dispatched `Action` is applied by
//! all handlers synchronously, then each handler is flushed. The dispatcher
//! serializes cycles: no two actions are ever applied concurrently.

pub mod action;
pub mod dispatcher;
pub mod error;

pub use action::Action;
pub use dispatcher::{ActionHandler, AppDispatcher, DispatchToken, Dispatcher};
pub use error::{DispatchError, DispatchResult};
