//! Replays a JSON-lines action log through a freshly built store.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use corestore::{Frozen, Notification, Snapshot, Store, StoreConfig};
use corestore_dispatcher::{Action, AppDispatcher};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

pub struct Replay {
    dispatcher: AppDispatcher,
    store: Arc<Store>,
}

impl Replay {
    pub fn load(definition: &Path) -> Result<Self> {
        Self::new(
            StoreConfig::new()
                .with_name("replay")
                .with_definition_path(definition),
        )
        .with_context(|| format!("Failed to build store from {}", definition.display()))
    }

    pub fn new(config: StoreConfig) -> Result<Self> {
        let dispatcher = AppDispatcher::new();
        let store = Store::attach(config, &dispatcher)?;

        for name in store.definition().entity_names() {
            let entity = store.entity(name)?;
            entity.add_change_listener(|n: &Notification| {
                info!(event = %n.event, payload = ?n.payload, "Entity changed");
                Ok(())
            });
            entity.add_error_listener(|n: &Notification| {
                warn!(event = %n.event, "Entity error updated");
                Ok(())
            });
        }

        info!(
            store = store.name(),
            entities = store.definition().len(),
            operations = store.operations().len(),
            "Store ready"
        );
        Ok(Self { dispatcher, store })
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Dispatch one line. Blank lines and `#` comments are skipped and
    /// return `false`.
    pub fn apply_line(&self, line: &str) -> Result<bool> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(false);
        }

        let action: Action = serde_json::from_str(line).context("Malformed action")?;
        debug!(action_type = %action.action_type, entities = action.data.len(), "Dispatching");
        self.dispatcher.dispatch(&action)?;
        Ok(true)
    }

    /// Dispatch every line of `input`, returning how many actions ran.
    pub fn apply_all(&self, input: &str) -> Result<usize> {
        let mut dispatched = 0;
        for (index, line) in input.lines().enumerate() {
            if self
                .apply_line(line)
                .with_context(|| format!("Action on line {} failed", index + 1))?
            {
                dispatched += 1;
            }
        }
        Ok(dispatched)
    }

    /// Final data, status and error snapshots as one JSON document.
    pub fn summary(&self) -> Value {
        json!({
            "data": thaw_all(&self.store.data_snapshot()),
            "status": self
                .store
                .status_snapshot()
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<Map<String, Value>>(),
            "error": thaw_all(&self.store.error_snapshot()),
        })
    }
}

fn thaw_all(snapshot: &Snapshot<Frozen>) -> Map<String, Value> {
    snapshot
        .iter()
        .map(|(k, v)| (k.to_string(), v.thaw()))
        .collect()
}
