//! TRANSFORM handler: thin wrapper over the pure transform engine.

use async_trait::async_trait;
use serde_json::Value;

use crate::definition::NodeSpec;
use crate::error::NodeResult;
use crate::nodes::registry::NodeHandler;
use crate::transform::apply_transform;

pub struct TransformHandler;

#[async_trait]
impl NodeHandler for TransformHandler {
    async fn execute(&self, node: &NodeSpec, parameters: &Value) -> NodeResult<Value> {
        apply_transform(&node.config, parameters)
    }
}
