//! Per-entity operation synthesis.
//!
//! At construction the store walks its definition once and binds eight
//! operations to every entity, each under an identifier derived from the
//! entity name (`getUser`, `updateUser`, `addUserChangeListener`, ...). The
//! result is an explicit table from identifier to `(entity, kind)`; dispatch
//! resolves `<action type><Entity>` against it.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::definition::Definition;
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    GetData,
    UpdateData,
    AddChangeListener,
    RemoveChangeListener,
    GetError,
    UpdateError,
    AddErrorListener,
    RemoveErrorListener,
}

impl OperationKind {
    pub const ALL: [OperationKind; 8] = [
        OperationKind::GetData,
        OperationKind::UpdateData,
        OperationKind::AddChangeListener,
        OperationKind::RemoveChangeListener,
        OperationKind::GetError,
        OperationKind::UpdateError,
        OperationKind::AddErrorListener,
        OperationKind::RemoveErrorListener,
    ];

    pub fn identifier(self, entity: &str) -> String {
        let cap = capitalize(entity);
        match self {
            OperationKind::GetData => format!("get{cap}"),
            OperationKind::UpdateData => format!("update{cap}"),
            OperationKind::AddChangeListener => format!("add{cap}ChangeListener"),
            OperationKind::RemoveChangeListener => format!("remove{cap}ChangeListener"),
            OperationKind::GetError => format!("getError{cap}"),
            OperationKind::UpdateError => format!("updateError{cap}"),
            OperationKind::AddErrorListener => format!("add{cap}ErrorListener"),
            OperationKind::RemoveErrorListener => format!("remove{cap}ErrorListener"),
        }
    }

    /// Only the two update kinds can be reached from a dispatched action.
    pub fn is_routable(self) -> bool {
        matches!(self, OperationKind::UpdateData | OperationKind::UpdateError)
    }
}

/// Upper-case the first character; the rest is left as is.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// An operation bound to one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundOperation {
    pub entity: String,
    pub kind: OperationKind,
}

#[derive(Debug, Clone, Default)]
pub struct OperationTable {
    by_identifier: HashMap<String, BoundOperation>,
}

impl OperationTable {
    /// Bind every operation kind to every entity of `definition`.
    ///
    /// Fails if an entity name is empty or if two bindings derive the same
    /// identifier (`user` and `User`, or `x` and `errorX` which both yield
    /// `getErrorX`).
    pub fn synthesize(definition: &Definition) -> StoreResult<Self> {
        let mut by_identifier: HashMap<String, BoundOperation> =
            HashMap::with_capacity(definition.len() * OperationKind::ALL.len());

        for entity in definition.entity_names() {
            if entity.is_empty() {
                return Err(StoreError::EmptyEntityName);
            }
            for kind in OperationKind::ALL {
                let identifier = kind.identifier(entity);
                match by_identifier.entry(identifier) {
                    Entry::Occupied(existing) => {
                        return Err(StoreError::SchemaCollision {
                            identifier: existing.key().clone(),
                            first: existing.get().entity.clone(),
                            second: entity.to_string(),
                        });
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(BoundOperation {
                            entity: entity.to_string(),
                            kind,
                        });
                    }
                }
            }
        }

        Ok(Self { by_identifier })
    }

    pub fn resolve(&self, identifier: &str) -> Option<&BoundOperation> {
        self.by_identifier.get(identifier)
    }

    /// The operation a dispatched action of `action_type` touching `entity`
    /// routes to: `<action_type><Entity>`, if it is an update kind bound to
    /// that entity.
    pub fn route(&self, action_type: &str, entity: &str) -> Option<&BoundOperation> {
        let identifier = format!("{action_type}{}", capitalize(entity));
        self.resolve(&identifier)
            .filter(|op| op.entity == entity && op.kind.is_routable())
    }

    /// Identifiers bound to `entity`, sorted.
    pub fn identifiers_for(&self, entity: &str) -> Vec<&str> {
        let mut identifiers: Vec<&str> = self
            .by_identifier
            .iter()
            .filter(|(_, op)| op.entity == entity)
            .map(|(identifier, _)| identifier.as_str())
            .collect();
        identifiers.sort_unstable();
        identifiers
    }

    pub fn len(&self) -> usize {
        self.by_identifier.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_identifier.is_empty()
    }
}
