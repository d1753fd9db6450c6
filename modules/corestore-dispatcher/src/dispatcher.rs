//! Dispatcher traits and the in-process `AppDispatcher`.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use tracing::{debug, warn};

use crate::action::Action;
use crate::error::{DispatchError, DispatchResult};

/// Opaque handle returned by `register`, used to unregister later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchToken(u64);

impl fmt::Display for DispatchToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID_{}", self.0)
    }
}

/// Receives every dispatched action.
///
/// A dispatch cycle has two phases. `handle` runs synchronously for every
/// registered handler, in registration order. Once all of them returned,
/// `flush` runs for each handler whose `handle` succeeded. Work that must
/// observe the fully applied cycle (change notifications) belongs in `flush`.
pub trait ActionHandler: Send + Sync {
    fn handle(&self, action: &Action) -> Result<()>;

    fn flush(&self) {}
}

impl<H: ActionHandler + ?Sized> ActionHandler for Arc<H> {
    fn handle(&self, action: &Action) -> Result<()> {
        (**self).handle(action)
    }

    fn flush(&self) {
        (**self).flush()
    }
}

/// Registration primitive a store subscribes to.
pub trait Dispatcher: Send + Sync {
    fn register(&self, handler: Arc<dyn ActionHandler>) -> DispatchToken;

    /// Returns `false` if the token was not registered.
    fn unregister(&self, token: DispatchToken) -> bool;
}

// ---------------------------------------------------------------------------
// AppDispatcher
// ---------------------------------------------------------------------------

/// Serializing in-process dispatcher. One action is applied at a time;
/// dispatching from inside `handle` is rejected, dispatching from inside
/// `flush` (i.e. from a change listener) is allowed.
pub struct AppDispatcher {
    next_id: AtomicU64,
    handlers: Mutex<Vec<(DispatchToken, Arc<dyn ActionHandler>)>>,
    dispatching: AtomicBool,
}

impl AppDispatcher {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            handlers: Mutex::new(Vec::new()),
            dispatching: AtomicBool::new(false),
        }
    }

    pub fn is_dispatching(&self) -> bool {
        self.dispatching.load(Ordering::SeqCst)
    }

    pub fn handler_count(&self) -> usize {
        self.lock_handlers().len()
    }

    /// Dispatch one action to every registered handler, then flush them.
    pub fn dispatch(&self, action: &Action) -> DispatchResult<()> {
        if self.dispatching.swap(true, Ordering::SeqCst) {
            return Err(DispatchError::AlreadyDispatching {
                action_type: action.action_type.clone(),
            });
        }

        let (completed, failure) = {
            let _guard = DispatchingGuard(&self.dispatching);
            self.apply(action)
        };

        for handler in completed {
            handler.flush();
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn apply(
        &self,
        action: &Action,
    ) -> (Vec<Arc<dyn ActionHandler>>, Option<DispatchError>) {
        // Handlers may (un)register while we iterate.
        let handlers = self.lock_handlers().clone();
        debug!(
            action_type = %action.action_type,
            handlers = handlers.len(),
            "Dispatching action"
        );

        let mut completed = Vec::with_capacity(handlers.len());
        for (token, handler) in handlers {
            if let Err(source) = handler.handle(action) {
                warn!(%token, action_type = %action.action_type, error = %source, "Handler failed");
                return (
                    completed,
                    Some(DispatchError::Handler {
                        token,
                        action_type: action.action_type.clone(),
                        source,
                    }),
                );
            }
            completed.push(handler);
        }
        (completed, None)
    }

    fn lock_handlers(
        &self,
    ) -> std::sync::MutexGuard<'_, Vec<(DispatchToken, Arc<dyn ActionHandler>)>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for AppDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher for AppDispatcher {
    fn register(&self, handler: Arc<dyn ActionHandler>) -> DispatchToken {
        let token = DispatchToken(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.lock_handlers().push((token, handler));
        debug!(%token, "Handler registered");
        token
    }

    fn unregister(&self, token: DispatchToken) -> bool {
        let mut handlers = self.lock_handlers();
        let before = handlers.len();
        handlers.retain(|(t, _)| *t != token);
        before != handlers.len()
    }
}

impl<D: Dispatcher + ?Sized> Dispatcher for Arc<D> {
    fn register(&self, handler: Arc<dyn ActionHandler>) -> DispatchToken {
        (**self).register(handler)
    }

    fn unregister(&self, token: DispatchToken) -> bool {
        (**self).unregister(token)
    }
}

/// Clears the dispatching flag even if a handler panics.
struct DispatchingGuard<'a>(&'a AtomicBool);

impl Drop for DispatchingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
