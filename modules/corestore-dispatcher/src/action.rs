//! The action payload carried through the dispatcher. Domain-agnostic.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One dispatched action.
///
/// `data` and `status` are keyed by entity name. Stores look up the entities
/// they know and ignore the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub status: Map<String, Value>,
}

impl Action {
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            data: Map::new(),
            status: Map::new(),
        }
    }

    pub fn with_data(mut self, entity: impl Into<String>, payload: Value) -> Self {
        self.data.insert(entity.into(), payload);
        self
    }

    pub fn with_status(mut self, entity: impl Into<String>, status: Value) -> Self {
        self.status.insert(entity.into(), status);
        self
    }

    /// Payload for `entity`, if the action carries one.
    pub fn data_for(&self, entity: &str) -> Option<&Value> {
        self.data.get(entity)
    }

    /// Status for `entity`, if the action carries one.
    pub fn status_for(&self, entity: &str) -> Option<&Value> {
        self.status.get(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_collects_data_and_status() {
        let action = Action::new("update")
            .with_data("user", json!({"id": 1}))
            .with_status("user", json!("success"));

        assert_eq!(action.action_type, "update");
        assert_eq!(action.data_for("user"), Some(&json!({"id": 1})));
        assert_eq!(action.status_for("user"), Some(&json!("success")));
        assert!(action.data_for("ghost").is_none());
    }

    #[test]
    fn deserializes_without_status() {
        let action: Action =
            serde_json::from_value(json!({"type": "update", "data": {"user": 1}})).unwrap();
        assert_eq!(action.action_type, "update");
        assert!(action.status.is_empty());
        assert_eq!(action.data_for("user"), Some(&json!(1)));
    }
}
