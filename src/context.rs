//! Per-run execution state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;
use uuid::Uuid;

use crate::error::ProcessError;

/// Terminal status of one attempted node. A retried node's entry reflects
/// its latest attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeStatus {
    Success,
    Failed,
}

/// Outcome of a finished run.
///
/// A failed run is data, not an `Err`: the engine always hands back one of
/// these. Note the tag is the only thing separating "the run failed" from
/// "the run succeeded and its value happens to look like an error" — callers
/// must branch on the variant, not on the value's shape.
#[derive(Debug, Clone)]
pub enum FinalResult {
    /// Every node ran; carries the last `current_parameters`.
    Completed(Value),
    /// The run halted at `node_id`; carries the captured failure.
    Failed {
        node_id: String,
        error: ProcessError,
    },
}

impl FinalResult {
    pub fn is_completed(&self) -> bool {
        matches!(self, FinalResult::Completed(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FinalResult::Failed { .. })
    }

    /// The completed value, when there is one.
    pub fn value(&self) -> Option<&Value> {
        match self {
            FinalResult::Completed(value) => Some(value),
            FinalResult::Failed { .. } => None,
        }
    }
}

/// Mutable state container for exactly one run.
///
/// Exclusively owned by the orchestrator for the run's lifetime; handlers
/// see the current parameters as a read-only snapshot and return new values.
#[derive(Debug)]
pub struct ExecutionContext {
    run_id: String,
    initial_parameters: Value,
    current_parameters: Value,
    node_results: Vec<(String, Value)>,
    node_status: HashMap<String, NodeStatus>,
    failed_node_id: Option<String>,
    captured_failure: Option<ProcessError>,
    deadline: Option<DateTime<Utc>>,
    max_retry_times: u32,
    current_node_id: Option<String>,
    node_started_at: Option<Instant>,
}

impl ExecutionContext {
    pub fn new(initial_parameters: Value) -> Self {
        ExecutionContext {
            run_id: Uuid::new_v4().to_string(),
            current_parameters: initial_parameters.clone(),
            initial_parameters,
            node_results: Vec::new(),
            node_status: HashMap::new(),
            failed_node_id: None,
            captured_failure: None,
            deadline: None,
            max_retry_times: 3,
            current_node_id: None,
            node_started_at: None,
        }
    }

    /// Absolute wall-clock deadline, sampled at node boundaries only.
    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_max_retry_times(mut self, max_retry_times: u32) -> Self {
        self.max_retry_times = max_retry_times;
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn initial_parameters(&self) -> &Value {
        &self.initial_parameters
    }

    pub fn current_parameters(&self) -> &Value {
        &self.current_parameters
    }

    pub fn set_current_parameters(&mut self, parameters: Value) {
        self.current_parameters = parameters;
    }

    /// Append a node's output. Each node id may be written at most once per
    /// run; a second write is a caller bug.
    pub fn put_result(&mut self, node_id: &str, value: Value) {
        debug_assert!(
            !self.node_results.iter().any(|(id, _)| id == node_id),
            "node result for {node_id} written twice in one run"
        );
        self.node_results.push((node_id.to_string(), value));
    }

    pub fn result(&self, node_id: &str) -> Option<&Value> {
        self.node_results
            .iter()
            .find(|(id, _)| id == node_id)
            .map(|(_, value)| value)
    }

    /// Successful node outputs in execution order.
    pub fn node_results(&self) -> &[(String, Value)] {
        &self.node_results
    }

    /// Record the halting node and its failure. Write-once: later calls are
    /// no-ops, the first failure is kept.
    pub fn set_failed(&mut self, node_id: &str, error: ProcessError) {
        if self.captured_failure.is_some() {
            return;
        }
        self.failed_node_id = Some(node_id.to_string());
        self.captured_failure = Some(error);
    }

    pub fn failed_node_id(&self) -> Option<&str> {
        self.failed_node_id.as_deref()
    }

    pub fn captured_failure(&self) -> Option<&ProcessError> {
        self.captured_failure.as_ref()
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn deadline_passed(&self) -> bool {
        match self.deadline {
            Some(deadline) => Utc::now() > deadline,
            None => false,
        }
    }

    pub fn max_retry_times(&self) -> u32 {
        self.max_retry_times
    }

    /// Mark a node attempt as started: remembers the node id and the start
    /// instant used for elapsed-time reporting.
    pub fn mark_node_started(&mut self, node_id: &str) {
        self.current_node_id = Some(node_id.to_string());
        self.node_started_at = Some(Instant::now());
    }

    pub fn current_node_id(&self) -> Option<&str> {
        self.current_node_id.as_deref()
    }

    /// Milliseconds since the current attempt started.
    pub fn node_elapsed_ms(&self) -> u64 {
        self.node_started_at
            .map(|started| started.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }

    pub fn set_node_status(&mut self, node_id: &str, status: NodeStatus) {
        self.node_status.insert(node_id.to_string(), status);
    }

    pub fn node_status(&self, node_id: &str) -> Option<NodeStatus> {
        self.node_status.get(node_id).copied()
    }

    /// Pure derivation of the run outcome: the captured failure if the run
    /// halted, else the current parameters. Callable any number of times.
    pub fn final_result(&self) -> FinalResult {
        match (&self.failed_node_id, &self.captured_failure) {
            (Some(node_id), Some(error)) => FinalResult::Failed {
                node_id: node_id.clone(),
                error: error.clone(),
            },
            _ => FinalResult::Completed(self.current_parameters.clone()),
        }
    }
}
