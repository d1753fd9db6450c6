use std::path::PathBuf;

use anyhow::Result;
use serde_json::Value;

use crate::definition::{Definition, DefinitionProvider, FileDefinition};
use crate::error::{StoreError, StoreResult};
use crate::handlers::CustomHandlers;
use crate::store::Store;

/// Options a store is constructed from.
///
/// `definition` wins over everything else. Without it the definition is
/// loaded from `definition_path`, with `custom_definition` overlaid.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    pub name: Option<String>,
    pub definition: Option<Definition>,
    pub definition_path: Option<PathBuf>,
    pub custom_definition: Option<Definition>,
    pub custom_handler: CustomHandlers,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label used in log lines.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_definition(mut self, definition: Definition) -> Self {
        self.definition = Some(definition);
        self
    }

    pub fn with_definition_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.definition_path = Some(path.into());
        self
    }

    pub fn with_custom_definition(mut self, custom: Definition) -> Self {
        self.custom_definition = Some(custom);
        self
    }

    pub fn with_custom_handler<F>(
        mut self,
        entity: impl Into<String>,
        action_type: impl Into<String>,
        handler: F,
    ) -> Self
    where
        F: Fn(&Store, Option<&Value>, Option<&Value>) -> Result<()> + Send + Sync + 'static,
    {
        self.custom_handler.insert(entity, action_type, handler);
        self
    }

    pub fn with_custom_handlers(mut self, handlers: CustomHandlers) -> Self {
        self.custom_handler = handlers;
        self
    }

    pub(crate) fn resolve_definition(&self) -> StoreResult<Definition> {
        if let Some(definition) = &self.definition {
            return Ok(definition.clone());
        }
        match &self.definition_path {
            Some(path) => Ok(FileDefinition::new(path)
                .with_custom(self.custom_definition.clone())
                .definition()?),
            None => Err(StoreError::MissingDefinition),
        }
    }
}
