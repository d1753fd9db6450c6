//! Hooks that preempt the generated update operations.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use corestore_dispatcher::Action;
use serde_json::Value;

use crate::store::Store;

/// Replaces the generated update for one `(entity, action type)` pair.
/// Receives the entity's payload and status from the action.
pub type CustomHandler =
    Arc<dyn Fn(&Store, Option<&Value>, Option<&Value>) -> Result<()> + Send + Sync>;

/// `entity → action type → handler`.
#[derive(Clone, Default)]
pub struct CustomHandlers {
    table: HashMap<String, HashMap<String, CustomHandler>>,
}

impl CustomHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<F>(&mut self, entity: impl Into<String>, action_type: impl Into<String>, handler: F)
    where
        F: Fn(&Store, Option<&Value>, Option<&Value>) -> Result<()> + Send + Sync + 'static,
    {
        self.table
            .entry(entity.into())
            .or_default()
            .insert(action_type.into(), Arc::new(handler));
    }

    pub fn with<F>(mut self, entity: impl Into<String>, action_type: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Store, Option<&Value>, Option<&Value>) -> Result<()> + Send + Sync + 'static,
    {
        self.insert(entity, action_type, handler);
        self
    }

    pub fn get(&self, entity: &str, action_type: &str) -> Option<&CustomHandler> {
        self.table.get(entity)?.get(action_type)
    }

    pub fn len(&self) -> usize {
        self.table.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for CustomHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (entity, types) in &self.table {
            map.entry(entity, &types.keys().collect::<Vec<_>>());
        }
        map.finish()
    }
}

/// Takes over a whole dispatch cycle: when set, no per-entity routing runs.
pub trait OverrideHandler: Send + Sync {
    fn handle(&self, store: &Store, action: &Action) -> Result<()>;
}

impl<F> OverrideHandler for F
where
    F: Fn(&Store, &Action) -> Result<()> + Send + Sync,
{
    fn handle(&self, store: &Store, action: &Action) -> Result<()> {
        self(store, action)
    }
}

/// How a store routes a dispatched action.
#[derive(Clone, Default)]
pub enum Routing {
    /// Per-entity routing through custom handlers and generated updates.
    #[default]
    Normal,
    /// Every action goes to one handler.
    Override(Arc<dyn OverrideHandler>),
}

impl Routing {
    pub fn is_override(&self) -> bool {
        matches!(self, Routing::Override(_))
    }
}

impl fmt::Debug for Routing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Routing::Normal => f.write_str("Normal"),
            Routing::Override(_) => f.write_str("Override(..)"),
        }
    }
}
