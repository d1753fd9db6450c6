//! Typed errors for store construction, routing and payload conversion.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An action type does not resolve to any operation for a known entity.
    #[error("no operation {identifier:?} for entity {entity:?} (action type {action_type:?})")]
    Routing {
        entity: String,
        action_type: String,
        identifier: String,
    },

    /// Two entities derive the same operation identifier.
    #[error("operation {identifier:?} is derived from both {first:?} and {second:?}")]
    SchemaCollision {
        identifier: String,
        first: String,
        second: String,
    },

    /// Entity names must be non-empty.
    #[error("definition contains an empty entity name")]
    EmptyEntityName,

    /// The entity is not part of this store's definition.
    #[error("entity {0:?} is not in the store definition")]
    UnknownEntity(String),

    /// No generated operation carries this identifier.
    #[error("unknown operation {0:?}")]
    UnknownOperation(String),

    /// The invocation does not fit the operation it was sent to.
    #[error("operation {identifier:?} cannot take a {invocation} invocation")]
    InvalidInvocation {
        identifier: String,
        invocation: &'static str,
    },

    /// The configuration names neither a definition nor a definition path.
    #[error("store configuration has neither a definition nor a definition path")]
    MissingDefinition,

    /// A custom or override handler failed.
    #[error("handler for {action_type:?} failed: {source}")]
    Handler {
        entity: Option<String>,
        action_type: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

/// A payload could not be turned into its frozen form.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Error payloads must be lists or maps.
    #[error("error payload must be a list or a map, got {kind}")]
    UnsupportedErrorShape { kind: &'static str },

    #[error("payload is not representable as JSON: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Loading an entity definition failed.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("failed to read definition file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse definition {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("metadata of entity {entity:?} is not representable as JSON: {source}")]
    Metadata {
        entity: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
