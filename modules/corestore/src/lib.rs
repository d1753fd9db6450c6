//! Schema-driven state store for a unidirectional data flow.
//!
//! A store is built from an entity definition. For every entity it binds a
//! set of operations (read, update, listen, for both data and error), keeps
//! three persistent snapshots (data, status, error) and republishes changes
//! as `<entity>:change` / `<entity>:error` notifications after each dispatch
//! cycle.
//!
//! The store registers itself on a `corestore_dispatcher::Dispatcher`; each
//! dispatched `Action` is routed per entity to a custom handler or to the
//! generated `<type><Entity>` update.

pub mod channel;
pub mod config;
pub mod definition;
pub mod error;
pub mod frozen;
pub mod handlers;
pub mod operations;
pub mod snapshot;
pub mod store;

pub use channel::{EventChannel, Listener, ListenerId, Notification};
pub use config::StoreConfig;
pub use definition::{Definition, DefinitionProvider, FileDefinition};
pub use error::{ConversionError, DefinitionError, StoreError, StoreResult};
pub use frozen::Frozen;
pub use handlers::{CustomHandler, CustomHandlers, OverrideHandler, Routing};
pub use operations::{capitalize, BoundOperation, OperationKind, OperationTable};
pub use snapshot::Snapshot;
pub use store::{EntityHandle, Invocation, Outcome, Store};

pub use corestore_dispatcher::{Action, AppDispatcher, DispatchToken, Dispatcher};
