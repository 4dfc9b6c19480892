//! CONDITIONAL handler: evaluates the configured condition against the
//! current parameters and returns `trueValue` or `falseValue` verbatim.

use async_trait::async_trait;
use serde_json::Value;

use crate::definition::NodeSpec;
use crate::error::NodeResult;
use crate::evaluator::condition::evaluate_condition;
use crate::nodes::registry::NodeHandler;

pub struct ConditionalHandler;

#[async_trait]
impl NodeHandler for ConditionalHandler {
    async fn execute(&self, node: &NodeSpec, parameters: &Value) -> NodeResult<Value> {
        let config = &node.config;
        let outcome = if evaluate_condition(config, parameters)? {
            config.get("trueValue")
        } else {
            config.get("falseValue")
        };
        // The outcome is returned as configured, not re-transformed; an
        // absent outcome key is null.
        Ok(outcome.cloned().unwrap_or(Value::Null))
    }
}
