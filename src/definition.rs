//! Node definitions and the boundary to the store that owns them.
//!
//! The engine never persists definitions; it reads a snapshot of one
//! definition's node list at run start through [`DefinitionSource`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::ProcessError;

/// One step of a process definition.
///
/// Immutable once loaded for a run. `node_type` stays a raw string here
/// because it travels in from an external store; it is parsed into a
/// [`NodeKind`] at dispatch time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    /// Display name, carried for logs and events only.
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub config: Value,
    /// Position in the pipeline; ties are broken by `id`.
    #[serde(default, alias = "sort")]
    pub order: i64,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>, config: Value) -> Self {
        NodeSpec {
            id: id.into(),
            name: String::new(),
            node_type: node_type.into(),
            config,
            order: 0,
        }
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// The closed set of node types the dispatcher can route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    #[serde(alias = "API_CALL")]
    RemoteCall,
    #[serde(alias = "DATA_TRANSFORM")]
    Transform,
    Conditional,
}

impl NodeKind {
    /// Parse a raw type string, accepting the legacy store spellings.
    pub fn parse(raw: &str) -> Option<NodeKind> {
        match raw {
            "REMOTE_CALL" | "API_CALL" => Some(NodeKind::RemoteCall),
            "TRANSFORM" | "DATA_TRANSFORM" => Some(NodeKind::Transform),
            "CONDITIONAL" => Some(NodeKind::Conditional),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::RemoteCall => "REMOTE_CALL",
            NodeKind::Transform => "TRANSFORM",
            NodeKind::Conditional => "CONDITIONAL",
        }
    }
}

/// Stable sort by `order`, ties by `id`.
pub fn sort_nodes(nodes: &mut [NodeSpec]) {
    nodes.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
}

/// Read boundary to whatever owns process definitions.
///
/// Implementations return the node list already sorted by the order key;
/// the orchestrator re-sorts anyway, so an unsorted source still works.
/// An unknown definition id yields an empty list, not an error.
#[async_trait]
pub trait DefinitionSource: Send + Sync {
    async fn list_nodes(&self, definition_id: &str) -> Result<Vec<NodeSpec>, ProcessError>;
}

/// Map-backed [`DefinitionSource`] for tests, demos, and embedders that
/// manage definitions themselves.
#[derive(Default)]
pub struct InMemoryDefinitions {
    definitions: RwLock<HashMap<String, Vec<NodeSpec>>>,
}

impl InMemoryDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a definition's node list.
    pub fn insert(&self, definition_id: impl Into<String>, mut nodes: Vec<NodeSpec>) {
        sort_nodes(&mut nodes);
        self.definitions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(definition_id.into(), nodes);
    }

    pub fn remove(&self, definition_id: &str) -> Option<Vec<NodeSpec>> {
        self.definitions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(definition_id)
    }
}

#[async_trait]
impl DefinitionSource for InMemoryDefinitions {
    async fn list_nodes(&self, definition_id: &str) -> Result<Vec<NodeSpec>, ProcessError> {
        let definitions = self.definitions.read().unwrap_or_else(|e| e.into_inner());
        Ok(definitions.get(definition_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_kind_parse() {
        assert_eq!(NodeKind::parse("REMOTE_CALL"), Some(NodeKind::RemoteCall));
        assert_eq!(NodeKind::parse("API_CALL"), Some(NodeKind::RemoteCall));
        assert_eq!(NodeKind::parse("TRANSFORM"), Some(NodeKind::Transform));
        assert_eq!(NodeKind::parse("DATA_TRANSFORM"), Some(NodeKind::Transform));
        assert_eq!(NodeKind::parse("CONDITIONAL"), Some(NodeKind::Conditional));
        assert_eq!(NodeKind::parse("FAN_OUT"), None);
        assert_eq!(NodeKind::parse(""), None);
    }

    #[test]
    fn test_sort_nodes_order_then_id() {
        let mut nodes = vec![
            NodeSpec::new("b", "TRANSFORM", json!({})).with_order(2),
            NodeSpec::new("c", "TRANSFORM", json!({})).with_order(1),
            NodeSpec::new("a", "TRANSFORM", json!({})).with_order(2),
        ];
        sort_nodes(&mut nodes);
        let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_node_spec_deserializes_legacy_fields() {
        let spec: NodeSpec = serde_json::from_value(json!({
            "id": "n1",
            "type": "API_CALL",
            "config": {"apiUrl": "http://example.com"},
            "sort": 5
        }))
        .unwrap();
        assert_eq!(spec.node_type, "API_CALL");
        assert_eq!(spec.order, 5);
        assert_eq!(spec.name, "");
    }

    #[tokio::test]
    async fn test_in_memory_definitions_sorted_and_isolated() {
        let store = InMemoryDefinitions::new();
        store.insert(
            "def-1",
            vec![
                NodeSpec::new("n2", "TRANSFORM", json!({"type": "FILTER"})).with_order(2),
                NodeSpec::new("n1", "TRANSFORM", json!({"type": "FILTER"})).with_order(1),
            ],
        );

        let nodes = store.list_nodes("def-1").await.unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].id, "n1");

        let missing = store.list_nodes("def-2").await.unwrap();
        assert!(missing.is_empty());
    }
}
