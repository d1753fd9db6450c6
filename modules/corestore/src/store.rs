//! The store: snapshots, generated operations and the dispatch handler.
//!
//! A dispatch cycle is two-phase. `handle` applies the action synchronously
//! and hands the cycle's notifications to the outbox. `flush` runs once the
//! dispatcher has applied the action everywhere and delivers the outbox in
//! order, so a listener always observes every write of the cycle.
//!
//! A listener may dispatch again while another store is still waiting for
//! its `flush`. That nested cycle appends to the outbox instead of replacing
//! it, so no applied change goes unannounced.
//!
//! No internal lock is held while user code (listeners, custom handlers, the
//! override handler) runs.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Result;
use corestore_dispatcher::{Action, ActionHandler, DispatchToken, Dispatcher};
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::channel::{change_event, error_event, EventChannel, Listener, ListenerId, Notification};
use crate::config::StoreConfig;
use crate::definition::Definition;
use crate::error::{StoreError, StoreResult};
use crate::frozen::Frozen;
use crate::handlers::{CustomHandlers, OverrideHandler, Routing};
use crate::operations::{BoundOperation, OperationKind, OperationTable};
use crate::snapshot::Snapshot;

const DEFAULT_NAME: &str = "store";

#[derive(Debug, Clone, Default)]
struct Snapshots {
    data: Snapshot<Frozen>,
    status: Snapshot<Value>,
    error: Snapshot<Frozen>,
}

/// Arguments for `Store::invoke`.
pub enum Invocation {
    /// `get<Entity>` / `getError<Entity>`.
    Read,
    /// `update<Entity>`.
    Update { payload: Value, status: Option<Value> },
    /// `updateError<Entity>`.
    UpdateError { payload: Value },
    /// `add<Entity>ChangeListener` / `add<Entity>ErrorListener`.
    Subscribe(Listener),
    /// `remove<Entity>ChangeListener` / `remove<Entity>ErrorListener`.
    Unsubscribe(ListenerId),
}

impl Invocation {
    fn label(&self) -> &'static str {
        match self {
            Invocation::Read => "read",
            Invocation::Update { .. } => "update",
            Invocation::UpdateError { .. } => "update-error",
            Invocation::Subscribe(_) => "subscribe",
            Invocation::Unsubscribe(_) => "unsubscribe",
        }
    }
}

/// Result of `Store::invoke`.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Value(Option<Value>),
    Updated,
    Subscribed(ListenerId),
    Unsubscribed(bool),
}

pub struct Store {
    name: String,
    definition: Definition,
    operations: OperationTable,
    custom_handlers: CustomHandlers,
    routing: RwLock<Routing>,
    state: RwLock<Snapshots>,
    pending: Mutex<Vec<Notification>>,
    outbox: Mutex<Vec<Notification>>,
    channel: EventChannel,
    registration: Mutex<Option<DispatchToken>>,
}

impl Store {
    /// Build a store from its configuration. The operation table is
    /// synthesized here, once; a colliding definition is rejected.
    pub fn new(config: StoreConfig) -> StoreResult<Arc<Self>> {
        let definition = config.resolve_definition()?;
        let operations = OperationTable::synthesize(&definition)?;
        let name = config.name.unwrap_or_else(|| DEFAULT_NAME.to_string());

        debug!(
            store = %name,
            entities = definition.len(),
            operations = operations.len(),
            custom_handlers = config.custom_handler.len(),
            "Store built"
        );

        Ok(Arc::new(Self {
            name,
            definition,
            operations,
            custom_handlers: config.custom_handler,
            routing: RwLock::new(Routing::Normal),
            state: RwLock::new(Snapshots::default()),
            pending: Mutex::new(Vec::new()),
            outbox: Mutex::new(Vec::new()),
            channel: EventChannel::new(),
            registration: Mutex::new(None),
        }))
    }

    /// Build a store and register it on `dispatcher`.
    pub fn attach(config: StoreConfig, dispatcher: &dyn Dispatcher) -> StoreResult<Arc<Self>> {
        let store = Self::new(config)?;
        store.register(dispatcher);
        Ok(store)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> &Definition {
        &self.definition
    }

    pub fn operations(&self) -> &OperationTable {
        &self.operations
    }

    // -----------------------------------------------------------------------
    // Dispatcher registration
    // -----------------------------------------------------------------------

    /// Register on `dispatcher`, replacing any previous registration token.
    pub fn register(self: &Arc<Self>, dispatcher: &dyn Dispatcher) -> DispatchToken {
        let token = dispatcher.register(self.clone());
        *lock(&self.registration) = Some(token);
        debug!(store = %self.name, %token, "Store registered");
        token
    }

    pub fn dispatch_token(&self) -> Option<DispatchToken> {
        *lock(&self.registration)
    }

    pub fn unregister(&self, dispatcher: &dyn Dispatcher) -> bool {
        match lock(&self.registration).take() {
            Some(token) => dispatcher.unregister(token),
            None => false,
        }
    }

    /// Unregister and drop every listener and queued notification.
    pub fn destroy(&self, dispatcher: &dyn Dispatcher) {
        self.unregister(dispatcher);
        self.channel.clear();
        lock(&self.pending).clear();
        lock(&self.outbox).clear();
        debug!(store = %self.name, "Store destroyed");
    }

    // -----------------------------------------------------------------------
    // Public surface
    // -----------------------------------------------------------------------

    /// Typed accessor for one entity's generated operations.
    pub fn entity(&self, name: &str) -> StoreResult<EntityHandle<'_>> {
        let name = self
            .definition
            .key(name)
            .ok_or_else(|| StoreError::UnknownEntity(name.to_string()))?;
        Ok(EntityHandle { store: self, name })
    }

    /// Status recorded by the last data update of `entity`.
    pub fn get_status(&self, entity: &str) -> Option<Value> {
        read(&self.state).status.get(entity).cloned()
    }

    /// Subscribe to any event name, including ones outside the generated set.
    pub fn add_listener<F>(&self, event: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&Notification) -> Result<()> + Send + Sync + 'static,
    {
        self.channel.add_listener(event, listener)
    }

    pub fn remove_listener(&self, event: &str, id: ListenerId) -> bool {
        self.channel.remove_listener(event, id)
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.channel.listener_count(event)
    }

    /// Run a generated operation by its identifier (`getUser`,
    /// `updateErrorUser`, ...).
    pub fn invoke(&self, identifier: &str, invocation: Invocation) -> StoreResult<Outcome> {
        let op = self
            .operations
            .resolve(identifier)
            .ok_or_else(|| StoreError::UnknownOperation(identifier.to_string()))?;
        let entity = op.entity.as_str();

        match (op.kind, invocation) {
            (OperationKind::GetData, Invocation::Read) => Ok(Outcome::Value(self.read_data(entity))),
            (OperationKind::GetError, Invocation::Read) => {
                Ok(Outcome::Value(self.read_error(entity)))
            }
            (OperationKind::UpdateData, Invocation::Update { payload, status }) => {
                self.write_data(entity, &payload, status);
                Ok(Outcome::Updated)
            }
            (OperationKind::UpdateError, Invocation::UpdateError { payload }) => {
                self.write_error(entity, &payload)?;
                Ok(Outcome::Updated)
            }
            (OperationKind::AddChangeListener, Invocation::Subscribe(listener)) => Ok(
                Outcome::Subscribed(self.channel.add_shared(change_event(entity), listener)),
            ),
            (OperationKind::AddErrorListener, Invocation::Subscribe(listener)) => Ok(
                Outcome::Subscribed(self.channel.add_shared(error_event(entity), listener)),
            ),
            (OperationKind::RemoveChangeListener, Invocation::Unsubscribe(id)) => Ok(
                Outcome::Unsubscribed(self.channel.remove_listener(&change_event(entity), id)),
            ),
            (OperationKind::RemoveErrorListener, Invocation::Unsubscribe(id)) => Ok(
                Outcome::Unsubscribed(self.channel.remove_listener(&error_event(entity), id)),
            ),
            (_, invocation) => Err(StoreError::InvalidInvocation {
                identifier: identifier.to_string(),
                invocation: invocation.label(),
            }),
        }
    }

    /// Hand every subsequent dispatch cycle to `handler`.
    pub fn set_global_handler<H: OverrideHandler + 'static>(&self, handler: H) {
        *write(&self.routing) = Routing::Override(Arc::new(handler));
    }

    pub fn clear_global_handler(&self) {
        *write(&self.routing) = Routing::Normal;
    }

    pub fn routing(&self) -> Routing {
        read(&self.routing).clone()
    }

    pub fn data_snapshot(&self) -> Snapshot<Frozen> {
        read(&self.state).data.clone()
    }

    pub fn status_snapshot(&self) -> Snapshot<Value> {
        read(&self.state).status.clone()
    }

    pub fn error_snapshot(&self) -> Snapshot<Frozen> {
        read(&self.state).error.clone()
    }

    /// Notifications written but not yet delivered.
    pub fn pending_notifications(&self) -> usize {
        lock(&self.outbox).len() + lock(&self.pending).len()
    }

    /// Deliver every completed cycle's notifications, then any written
    /// outside a cycle, in enqueue order. Called by the dispatcher after each
    /// cycle; callers driving the store without a dispatcher call it
    /// themselves.
    ///
    /// Returns the number of successful listener deliveries.
    pub fn flush(&self) -> usize {
        let mut batch = std::mem::take(&mut *lock(&self.outbox));
        batch.append(&mut lock(&self.pending));
        let mut delivered = 0;
        for notification in &batch {
            let count = self.channel.emit(notification);
            trace!(store = %self.name, event = %notification.event, listeners = count, "Notification delivered");
            delivered += count;
        }
        delivered
    }

    // -----------------------------------------------------------------------
    // Dispatch handler
    // -----------------------------------------------------------------------

    fn dispatch_action(&self, action: &Action) -> StoreResult<()> {
        lock(&self.pending).clear();

        if let Routing::Override(handler) = self.routing() {
            debug!(store = %self.name, action_type = %action.action_type, "Override handler takes the cycle");
            return handler
                .handle(self, action)
                .map_err(|source| StoreError::Handler {
                    entity: None,
                    action_type: action.action_type.clone(),
                    source,
                });
        }

        for (entity, payload) in &action.data {
            if !self.definition.contains(entity) {
                trace!(store = %self.name, %entity, "Skipping entity outside the definition");
                continue;
            }
            let status = action.status_for(entity);

            if let Some(handler) = self.custom_handlers.get(entity, &action.action_type) {
                trace!(store = %self.name, %entity, action_type = %action.action_type, "Custom handler");
                handler(self, Some(payload), status).map_err(|source| StoreError::Handler {
                    entity: Some(entity.clone()),
                    action_type: action.action_type.clone(),
                    source,
                })?;
                continue;
            }

            let op = self
                .operations
                .route(&action.action_type, entity)
                .ok_or_else(|| routing_error(&action.action_type, entity))?;
            self.apply(op, &action.action_type, payload, status)?;
        }

        Ok(())
    }

    fn apply(
        &self,
        op: &BoundOperation,
        action_type: &str,
        payload: &Value,
        status: Option<&Value>,
    ) -> StoreResult<()> {
        match op.kind {
            OperationKind::UpdateData => {
                self.write_data(&op.entity, payload, status.cloned());
                Ok(())
            }
            OperationKind::UpdateError => match self.write_error(&op.entity, payload) {
                Err(StoreError::Conversion(err)) => {
                    warn!(store = %self.name, entity = %op.entity, error = %err, "Dropping unconvertible error payload");
                    Ok(())
                }
                other => other,
            },
            _ => Err(routing_error(action_type, &op.entity)),
        }
    }

    // -----------------------------------------------------------------------
    // Bound operations
    // -----------------------------------------------------------------------

    fn read_data(&self, entity: &str) -> Option<Value> {
        let state = read(&self.state);
        let frozen = state.data.get(entity)?;
        if !frozen.is_scalar() && frozen.is_empty() {
            return None;
        }
        Some(frozen.thaw())
    }

    fn write_data(&self, entity: &str, payload: &Value, status: Option<Value>) {
        let frozen = Frozen::freeze(payload);
        let notification = Notification::change(entity, status.as_ref());
        {
            let mut state = write(&self.state);
            state.data = state.data.set(entity, frozen);
            state.status = match status {
                Some(status) => state.status.set(entity, status),
                None => state.status.remove(entity),
            };
        }
        lock(&self.pending).push(notification);
    }

    fn read_error(&self, entity: &str) -> Option<Value> {
        read(&self.state).error.get(entity).map(Frozen::thaw)
    }

    fn write_error(&self, entity: &str, payload: &Value) -> StoreResult<()> {
        let frozen = Frozen::freeze_error(payload)?;
        {
            let mut state = write(&self.state);
            state.error = state.error.set(entity, frozen);
        }
        lock(&self.pending).push(Notification::error(entity));
        Ok(())
    }
}

impl ActionHandler for Store {
    fn handle(&self, action: &Action) -> Result<()> {
        let result = self.dispatch_action(action);
        let mut batch = std::mem::take(&mut *lock(&self.pending));
        // A failed cycle is never flushed.
        if result.is_ok() {
            lock(&self.outbox).append(&mut batch);
        }
        Ok(result?)
    }

    fn flush(&self) {
        Store::flush(self);
    }
}

fn routing_error(action_type: &str, entity: &str) -> StoreError {
    StoreError::Routing {
        entity: entity.to_string(),
        action_type: action_type.to_string(),
        identifier: format!("{action_type}{}", crate::operations::capitalize(entity)),
    }
}

// ---------------------------------------------------------------------------
// EntityHandle
// ---------------------------------------------------------------------------

/// The operations generated for one entity.
#[derive(Clone, Copy)]
pub struct EntityHandle<'a> {
    store: &'a Store,
    name: &'a str,
}

impl<'a> EntityHandle<'a> {
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// `get<Entity>`: the plain data, or `None` if unset or an empty
    /// collection. Scalars, including `false`, `0` and `null`, come back as is.
    pub fn get(&self) -> Option<Value> {
        self.store.read_data(self.name)
    }

    /// `update<Entity>`: replace the data and status, queue `<entity>:change`.
    pub fn update(&self, payload: &Value, status: Option<Value>) {
        self.store.write_data(self.name, payload, status)
    }

    /// `update<Entity>` from any serializable value.
    pub fn update_from<T: serde::Serialize + ?Sized>(
        &self,
        payload: &T,
        status: Option<Value>,
    ) -> StoreResult<()> {
        let plain = serde_json::to_value(payload).map_err(crate::error::ConversionError::from)?;
        self.update(&plain, status);
        Ok(())
    }

    pub fn status(&self) -> Option<Value> {
        self.store.get_status(self.name)
    }

    /// `getError<Entity>`.
    pub fn get_error(&self) -> Option<Value> {
        self.store.read_error(self.name)
    }

    /// `updateError<Entity>`: replace the error, queue `<entity>:error`.
    pub fn update_error(&self, payload: &Value) -> StoreResult<()> {
        self.store.write_error(self.name, payload)
    }

    /// `add<Entity>ChangeListener`.
    pub fn add_change_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Notification) -> Result<()> + Send + Sync + 'static,
    {
        self.store.channel.add_listener(change_event(self.name), listener)
    }

    /// `remove<Entity>ChangeListener`.
    pub fn remove_change_listener(&self, id: ListenerId) -> bool {
        self.store.channel.remove_listener(&change_event(self.name), id)
    }

    /// `add<Entity>ErrorListener`.
    pub fn add_error_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Notification) -> Result<()> + Send + Sync + 'static,
    {
        self.store.channel.add_listener(error_event(self.name), listener)
    }

    /// `remove<Entity>ErrorListener`.
    pub fn remove_error_listener(&self, id: ListenerId) -> bool {
        self.store.channel.remove_listener(&error_event(self.name), id)
    }
}

// ---------------------------------------------------------------------------
// Lock helpers: a panicking listener must not wedge the store
// ---------------------------------------------------------------------------

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
