//! Per-node validation, deadline check, handler routing, and bounded retry.
//!
//! All handler errors stop here: retryable ones are re-attempted in place up
//! to the context's bound, everything else is wrapped and propagated so the
//! orchestrator halts the run. Retry is an explicit loop with an attempt
//! counter; there is no backoff and no recursion.

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::context::{ExecutionContext, NodeStatus};
use crate::definition::{NodeKind, NodeSpec};
use crate::error::{NodeError, ProcessError, ProcessResult};
use crate::event::{EventEmitter, ProcessEvent};
use crate::nodes::HandlerRegistry;

pub struct Dispatcher {
    registry: HandlerRegistry,
    emitter: EventEmitter,
}

impl Dispatcher {
    pub fn new(registry: HandlerRegistry, emitter: EventEmitter) -> Self {
        Dispatcher { registry, emitter }
    }

    /// Run one node to completion: validate, route, retry transient
    /// failures, and return the node's output or the error that halts the
    /// run.
    pub async fn run(
        &self,
        node: &NodeSpec,
        context: &mut ExecutionContext,
    ) -> ProcessResult<Value> {
        validate_node(node)?;

        let kind = NodeKind::parse(&node.node_type)
            .ok_or_else(|| ProcessError::UnsupportedType(node.node_type.clone()))?;
        let handler = self
            .registry
            .get(kind)
            .ok_or_else(|| ProcessError::UnsupportedType(node.node_type.clone()))?;

        let max_retry_times = context.max_retry_times();
        let mut attempt: u32 = 0;

        loop {
            // The deadline is sampled at attempt boundaries, never
            // mid-node.
            if context.deadline_passed() {
                return Err(ProcessError::DeadlineExceeded {
                    node_id: node.id.clone(),
                });
            }

            context.mark_node_started(&node.id);
            self.emitter.emit(ProcessEvent::NodeStarted {
                run_id: context.run_id().to_string(),
                node_id: node.id.clone(),
                node_type: kind.as_str().to_string(),
                attempt,
                timestamp: Utc::now(),
            });

            let input = context.current_parameters().clone();
            let result = handler.execute(node, &input).await;
            let elapsed_ms = context.node_elapsed_ms();

            match result {
                Ok(output) => {
                    context.set_node_status(&node.id, NodeStatus::Success);
                    debug!(
                        node_id = %node.id,
                        input = %input,
                        output = %output,
                        "node input/output"
                    );
                    info!(
                        node_id = %node.id,
                        node_type = kind.as_str(),
                        attempt,
                        elapsed_ms,
                        "node executed"
                    );
                    self.emitter.emit(ProcessEvent::NodeSucceeded {
                        run_id: context.run_id().to_string(),
                        node_id: node.id.clone(),
                        node_type: kind.as_str().to_string(),
                        attempt,
                        elapsed_ms,
                        input,
                        output: output.clone(),
                        timestamp: Utc::now(),
                    });
                    return Ok(output);
                }
                Err(cause) => {
                    context.set_node_status(&node.id, NodeStatus::Failed);
                    let will_retry = cause.is_retryable() && attempt < max_retry_times;
                    self.emitter.emit(ProcessEvent::NodeFailed {
                        run_id: context.run_id().to_string(),
                        node_id: node.id.clone(),
                        node_type: kind.as_str().to_string(),
                        attempt,
                        elapsed_ms,
                        error: cause.to_string(),
                        will_retry,
                        timestamp: Utc::now(),
                    });

                    if will_retry {
                        warn!(
                            node_id = %node.id,
                            attempt,
                            max_retry_times,
                            error = %cause,
                            "retrying node"
                        );
                        attempt += 1;
                        continue;
                    }

                    error!(
                        node_id = %node.id,
                        node_type = kind.as_str(),
                        attempt,
                        elapsed_ms,
                        error = %cause,
                        "node failed"
                    );
                    return Err(wrap_failure(&node.id, cause, attempt));
                }
            }
        }
    }
}

/// Validation happens before dispatch so handlers see a well-formed node:
/// a non-empty type and a non-empty object config.
fn validate_node(node: &NodeSpec) -> ProcessResult<()> {
    if node.node_type.trim().is_empty() {
        return Err(ProcessError::ValidationError(format!(
            "node {}: type must not be empty",
            node.id
        )));
    }
    match &node.config {
        Value::Object(map) if !map.is_empty() => Ok(()),
        _ => Err(ProcessError::ValidationError(format!(
            "node {}: config must be a non-empty object",
            node.id
        ))),
    }
}

/// Terminal wrapping once retries are exhausted or the cause is not
/// retryable. A retryable cause gets its final attempt number stamped; an
/// unsupported sub-type lifts to the run-level unsupported-type error.
fn wrap_failure(node_id: &str, cause: NodeError, attempt: u32) -> ProcessError {
    match cause {
        NodeError::UnsupportedType(what) => ProcessError::UnsupportedType(what),
        NodeError::Retryable { message, .. } => ProcessError::NodeExecutionError {
            node_id: node_id.to_string(),
            source: NodeError::Retryable { attempt, message },
        },
        other => ProcessError::NodeExecutionError {
            node_id: node_id.to_string(),
            source: other,
        },
    }
}
