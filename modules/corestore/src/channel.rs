//! Publish/subscribe channel keyed by event name.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

/// Callback registered on an event.
pub type Listener = Arc<dyn Fn(&Notification) -> Result<()> + Send + Sync>;

/// Token returned by `add_listener`; closures cannot be compared, so
/// unsubscription goes through this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// One event waiting for, or being, delivered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub event: String,
    pub payload: Option<Value>,
}

impl Notification {
    pub fn new(event: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }

    /// `<entity>:change` carrying `{property, status}`.
    pub fn change(entity: &str, status: Option<&Value>) -> Self {
        Self::new(
            change_event(entity),
            Some(json!({ "property": entity, "status": status })),
        )
    }

    /// `<entity>:error`. Carries no payload.
    pub fn error(entity: &str) -> Self {
        Self::new(error_event(entity), None)
    }
}

pub fn change_event(entity: &str) -> String {
    format!("{entity}:change")
}

pub fn error_event(entity: &str) -> String {
    format!("{entity}:error")
}

// ---------------------------------------------------------------------------
// EventChannel
// ---------------------------------------------------------------------------

pub struct EventChannel {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<String, Vec<(ListenerId, Listener)>>>,
}

impl EventChannel {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(HashMap::new()),
        }
    }

    pub fn add_listener<F>(&self, event: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&Notification) -> Result<()> + Send + Sync + 'static,
    {
        self.add_shared(event, Arc::new(listener))
    }

    pub fn add_shared(&self, event: impl Into<String>, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.lock()
            .entry(event.into())
            .or_default()
            .push((id, listener));
        id
    }

    /// Returns `false` if `id` was not subscribed to `event`.
    pub fn remove_listener(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let Some(subscribers) = listeners.get_mut(event) else {
            return false;
        };
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        let removed = subscribers.len() != before;
        if subscribers.is_empty() {
            listeners.remove(event);
        }
        removed
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.lock().get(event).map_or(0, Vec::len)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Deliver to every listener of `notification.event`, in registration
    /// order. The subscriber list is captured before the first call, so
    /// listeners may (un)subscribe while being notified. A failing or
    /// panicking listener is logged and skipped; the rest still run.
    ///
    /// Returns the number of listeners that completed successfully.
    pub fn emit(&self, notification: &Notification) -> usize {
        let subscribers: Vec<(ListenerId, Listener)> = match self.lock().get(&notification.event) {
            Some(subscribers) => subscribers.clone(),
            None => return 0,
        };

        let mut delivered = 0;
        for (id, listener) in subscribers {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(notification))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(err)) => {
                    warn!(event = %notification.event, listener = ?id, error = %err, "Listener failed");
                }
                Err(_) => {
                    warn!(event = %notification.event, listener = ?id, "Listener panicked");
                }
            }
        }
        delivered
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<(ListenerId, Listener)>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> Listener) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let log = log.clone();
            move |name: &'static str| -> Listener {
                let log = log.clone();
                Arc::new(move |n: &Notification| {
                    log.lock().unwrap().push(format!("{name}:{}", n.event));
                    Ok(())
                })
            }
        };
        (log, make)
    }

    #[test]
    fn emits_in_registration_order() {
        let channel = EventChannel::new();
        let (log, make) = recorder();
        channel.add_shared("user:change", make("a"));
        channel.add_shared("user:change", make("b"));
        channel.add_shared("other:change", make("c"));

        let delivered = channel.emit(&Notification::new("user:change", None));

        assert_eq!(delivered, 2);
        assert_eq!(*log.lock().unwrap(), vec!["a:user:change", "b:user:change"]);
    }

    #[test]
    fn removed_listener_stops_receiving() {
        let channel = EventChannel::new();
        let (log, make) = recorder();
        let id = channel.add_shared("e", make("a"));

        assert!(channel.remove_listener("e", id));
        assert!(!channel.remove_listener("e", id));
        assert_eq!(channel.listener_count("e"), 0);
        assert_eq!(channel.emit(&Notification::new("e", None)), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn failing_and_panicking_listeners_do_not_starve_siblings() {
        let channel = EventChannel::new();
        let (log, make) = recorder();
        channel.add_listener("e", |_| anyhow::bail!("nope"));
        channel.add_listener("e", |_| panic!("boom"));
        channel.add_shared("e", make("survivor"));

        assert_eq!(channel.emit(&Notification::new("e", None)), 1);
        assert_eq!(*log.lock().unwrap(), vec!["survivor:e"]);
    }

    #[test]
    fn change_payload_shape() {
        let n = Notification::change("user", Some(&json!("success")));
        assert_eq!(n.event, "user:change");
        assert_eq!(
            n.payload,
            Some(json!({"property": "user", "status": "success"}))
        );
        assert_eq!(Notification::error("user").payload, None);
    }
}
