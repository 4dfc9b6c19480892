//! The orchestrator: walks an ordered node list, threads each node's output
//! into the next, and turns the context's terminal state into the run's
//! [`FinalResult`].

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::context::{ExecutionContext, FinalResult};
use crate::definition::{sort_nodes, DefinitionSource, NodeKind, NodeSpec};
use crate::dispatcher::Dispatcher;
use crate::error::{ProcessError, ProcessResult};
use crate::event::{EventEmitter, EventSender, ProcessEvent};
use crate::http::{HttpClient, ReqwestHttpClient};
use crate::nodes::{HandlerRegistry, NodeHandler};

/// Sequential process execution engine.
///
/// Construct through [`ProcessEngine::builder`]. One engine serves any
/// number of runs; each run gets its own [`ExecutionContext`] and runs its
/// nodes strictly in order.
pub struct ProcessEngine {
    config: EngineConfig,
    dispatcher: Dispatcher,
    definitions: Option<Arc<dyn DefinitionSource>>,
    emitter: EventEmitter,
}

impl ProcessEngine {
    pub fn builder() -> ProcessEngineBuilder {
        ProcessEngineBuilder::new()
    }

    /// Run a node list against the initial parameters. Never fails: a
    /// halted run comes back as [`FinalResult::Failed`].
    pub async fn execute(&self, nodes: Vec<NodeSpec>, initial_parameters: Value) -> FinalResult {
        let mut context = ExecutionContext::new(initial_parameters)
            .with_max_retry_times(self.config.max_retry_times);
        if let Some(budget_ms) = self.config.run_timeout_ms {
            context = context
                .with_deadline(Utc::now() + chrono::Duration::milliseconds(budget_ms as i64));
        }
        self.execute_with_context(nodes, &mut context).await;
        context.final_result()
    }

    /// The orchestration loop against a caller-supplied context. Fail-fast:
    /// the first unrecoverable node failure stops iteration, nodes after it
    /// never run.
    pub async fn execute_with_context(
        &self,
        mut nodes: Vec<NodeSpec>,
        context: &mut ExecutionContext,
    ) {
        sort_nodes(&mut nodes);
        let run_started = Instant::now();
        let node_count = nodes.len();
        info!(run_id = %context.run_id(), node_count, "run started");

        for node in &nodes {
            match self.dispatcher.run(node, context).await {
                Ok(result) => {
                    context.put_result(&node.id, result.clone());
                    context.set_current_parameters(result);
                }
                Err(error) => {
                    warn!(
                        run_id = %context.run_id(),
                        node_id = %node.id,
                        error = %error,
                        "run interrupted"
                    );
                    self.emitter.emit(ProcessEvent::RunInterrupted {
                        run_id: context.run_id().to_string(),
                        node_id: node.id.clone(),
                        error: error.to_string(),
                        elapsed_ms: run_started.elapsed().as_millis() as u64,
                        timestamp: Utc::now(),
                    });
                    context.set_failed(&node.id, error);
                    return;
                }
            }
        }

        info!(
            run_id = %context.run_id(),
            node_count,
            elapsed_ms = run_started.elapsed().as_millis() as u64,
            "run completed"
        );
        self.emitter.emit(ProcessEvent::RunCompleted {
            run_id: context.run_id().to_string(),
            output: context.current_parameters().clone(),
            elapsed_ms: run_started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        });
    }

    /// Load a definition's node list from the injected source and run it.
    /// An unknown definition yields an empty list and therefore a run that
    /// completes immediately with the initial parameters; the only error
    /// path is the definitions source itself.
    pub async fn execute_process(
        &self,
        definition_id: &str,
        initial_parameters: Value,
    ) -> ProcessResult<FinalResult> {
        let definitions = self.definitions.as_ref().ok_or_else(|| {
            ProcessError::DefinitionError("no definitions source configured".to_string())
        })?;
        let nodes = definitions.list_nodes(definition_id).await?;
        Ok(self.execute(nodes, initial_parameters).await)
    }
}

/// Builder for [`ProcessEngine`].
pub struct ProcessEngineBuilder {
    config: EngineConfig,
    http_client: Option<Arc<dyn HttpClient>>,
    definitions: Option<Arc<dyn DefinitionSource>>,
    event_sender: Option<EventSender>,
    handler_overrides: Vec<(NodeKind, Box<dyn NodeHandler>)>,
}

impl ProcessEngineBuilder {
    fn new() -> Self {
        ProcessEngineBuilder {
            config: EngineConfig::default(),
            http_client: None,
            definitions: None,
            event_sender: None,
            handler_overrides: Vec::new(),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn definitions(mut self, definitions: Arc<dyn DefinitionSource>) -> Self {
        self.definitions = Some(definitions);
        self
    }

    pub fn event_sender(mut self, sender: EventSender) -> Self {
        self.event_sender = Some(sender);
        self
    }

    /// Replace the built-in handler for one node kind.
    pub fn handler(mut self, kind: NodeKind, handler: Box<dyn NodeHandler>) -> Self {
        self.handler_overrides.push((kind, handler));
        self
    }

    pub fn build(self) -> ProcessResult<ProcessEngine> {
        let http_client: Arc<dyn HttpClient> = match self.http_client {
            Some(client) => client,
            None => Arc::new(ReqwestHttpClient::new().map_err(|e| {
                ProcessError::ValidationError(format!("failed to build HTTP client: {e}"))
            })?),
        };

        let mut registry = HandlerRegistry::new(http_client, &self.config);
        for (kind, handler) in self.handler_overrides {
            registry.register(kind, handler);
        }

        let emitter = match self.event_sender {
            Some(sender) => EventEmitter::new(sender),
            None => EventEmitter::disabled(),
        };

        Ok(ProcessEngine {
            config: self.config,
            dispatcher: Dispatcher::new(registry, emitter.clone()),
            definitions: self.definitions,
            emitter,
        })
    }
}
