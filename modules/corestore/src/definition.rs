//! Entity definitions: the set of entity names a store manages.
//!
//! Metadata attached to an entity is opaque to the store; only the key set
//! drives operation synthesis.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::DefinitionError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Definition {
    entities: BTreeMap<String, Value>,
}

impl Definition {
    pub fn new() -> Self {
        Self::default()
    }

    /// A definition whose entities carry empty metadata.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entities: names
                .into_iter()
                .map(|name| (name.into(), Value::Object(Default::default())))
                .collect(),
        }
    }

    pub fn with_entity(mut self, name: impl Into<String>, metadata: Value) -> Self {
        self.insert(name, metadata);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, metadata: Value) {
        self.entities.insert(name.into(), metadata);
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    pub fn metadata(&self, name: &str) -> Option<&Value> {
        self.entities.get(name)
    }

    /// The stored key for `name`, borrowed from the definition.
    pub(crate) fn key(&self, name: &str) -> Option<&str> {
        self.entities.get_key_value(name).map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Overlay a custom definition. Object metadata is merged key by key with
    /// the custom side winning; anything else is replaced. Entities only
    /// present in `custom` are added.
    pub fn merge(mut self, custom: &Definition) -> Self {
        for (name, overlay) in &custom.entities {
            match (self.entities.get_mut(name), overlay) {
                (Some(Value::Object(base)), Value::Object(extra)) => {
                    for (k, v) in extra {
                        base.insert(k.clone(), v.clone());
                    }
                }
                _ => {
                    self.entities.insert(name.clone(), overlay.clone());
                }
            }
        }
        self
    }

    /// Parse the TOML definition format:
    ///
    /// ```toml
    /// [entities.user]
    /// label = "Current user"
    ///
    /// [entities.session]
    /// ```
    pub fn from_toml_str(content: &str, origin: &str) -> Result<Self, DefinitionError> {
        let file: DefinitionFile =
            toml::from_str(content).map_err(|source| DefinitionError::Parse {
                origin: origin.to_string(),
                source,
            })?;

        let mut definition = Definition::new();
        for (name, metadata) in file.entities {
            let metadata =
                serde_json::to_value(&metadata).map_err(|source| DefinitionError::Metadata {
                    entity: name.clone(),
                    source,
                })?;
            definition.insert(name, metadata);
        }
        Ok(definition)
    }
}

#[derive(Debug, Deserialize)]
struct DefinitionFile {
    entities: toml::Table,
}

/// Supplies the definition a store is built from.
pub trait DefinitionProvider {
    fn definition(&self) -> Result<Definition, DefinitionError>;
}

impl DefinitionProvider for Definition {
    fn definition(&self) -> Result<Definition, DefinitionError> {
        Ok(self.clone())
    }
}

// ---------------------------------------------------------------------------
// FileDefinition
// ---------------------------------------------------------------------------

/// Definition loaded from a TOML file, optionally overlaid with a custom
/// definition.
#[derive(Debug, Clone)]
pub struct FileDefinition {
    path: PathBuf,
    custom: Option<Definition>,
}

impl FileDefinition {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            custom: None,
        }
    }

    pub fn with_custom(mut self, custom: Option<Definition>) -> Self {
        self.custom = custom;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DefinitionProvider for FileDefinition {
    fn definition(&self) -> Result<Definition, DefinitionError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| DefinitionError::Read {
            path: self.path.clone(),
            source,
        })?;
        let origin = self.path.display().to_string();
        let mut definition = Definition::from_toml_str(&content, &origin)?;
        if let Some(custom) = &self.custom {
            definition = definition.merge(custom);
        }

        debug!(path = %origin, entities = definition.len(), "Loaded entity definition");
        Ok(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_names_builds_empty_metadata() {
        let def = Definition::from_names(["user", "session"]);
        assert_eq!(def.len(), 2);
        assert!(def.contains("user"));
        assert_eq!(def.metadata("session"), Some(&json!({})));
        assert_eq!(def.entity_names().collect::<Vec<_>>(), vec!["session", "user"]);
    }

    #[test]
    fn merge_overlays_object_metadata() {
        let base = Definition::new()
            .with_entity("user", json!({"label": "User", "required": true}))
            .with_entity("tags", json!(["a"]));
        let custom = Definition::new()
            .with_entity("user", json!({"label": "Person"}))
            .with_entity("tags", json!({"kind": "list"}))
            .with_entity("extra", json!({}));

        let merged = base.merge(&custom);

        assert_eq!(
            merged.metadata("user"),
            Some(&json!({"label": "Person", "required": true}))
        );
        assert_eq!(merged.metadata("tags"), Some(&json!({"kind": "list"})));
        assert!(merged.contains("extra"));
    }

    #[test]
    fn parses_toml_entities() {
        let def = Definition::from_toml_str(
            r#"
            [entities.user]
            label = "Current user"
            fields = ["id", "name"]

            [entities.session]
            "#,
            "inline",
        )
        .unwrap();

        assert_eq!(def.len(), 2);
        assert_eq!(
            def.metadata("user"),
            Some(&json!({"label": "Current user", "fields": ["id", "name"]}))
        );
        assert_eq!(def.metadata("session"), Some(&json!({})));
    }

    #[test]
    fn toml_without_entities_table_is_a_parse_error() {
        let err = Definition::from_toml_str("title = 'x'", "inline").unwrap_err();
        assert!(matches!(err, DefinitionError::Parse { ref origin, .. } if origin == "inline"));
    }
}
