use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::definition::{NodeKind, NodeSpec};
use crate::error::NodeResult;
use crate::http::HttpClient;

/// One node type's executor. Handlers read the current parameters as a
/// snapshot and return a new value; they never touch context state.
#[async_trait]
pub trait NodeHandler: Send + Sync {
    async fn execute(&self, node: &NodeSpec, parameters: &Value) -> NodeResult<Value>;
}

/// Registry mapping [`NodeKind`] to its handler. Seeded with the three
/// built-ins; `register` swaps in replacements (stub handlers in tests).
pub struct HandlerRegistry {
    handlers: HashMap<NodeKind, Box<dyn NodeHandler>>,
}

impl HandlerRegistry {
    pub fn new(http_client: Arc<dyn HttpClient>, config: &EngineConfig) -> Self {
        let mut registry = HandlerRegistry {
            handlers: HashMap::new(),
        };
        registry.register(
            NodeKind::RemoteCall,
            Box::new(super::remote_call::RemoteCallHandler::new(
                http_client,
                config.default_call_timeout_ms,
            )),
        );
        registry.register(
            NodeKind::Transform,
            Box::new(super::transform::TransformHandler),
        );
        registry.register(
            NodeKind::Conditional,
            Box::new(super::conditional::ConditionalHandler),
        );
        registry
    }

    pub fn register(&mut self, kind: NodeKind, handler: Box<dyn NodeHandler>) {
        self.handlers.insert(kind, handler);
    }

    pub fn get(&self, kind: NodeKind) -> Option<&dyn NodeHandler> {
        self.handlers.get(&kind).map(|h| h.as_ref())
    }
}
