//! End-to-end runs through the public API.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use procflow::error::NodeResult;
use procflow::{
    create_event_channel, EngineConfig, ExecutionContext, FinalResult, HttpClient, HttpRequest,
    HttpResponse, InMemoryDefinitions, NodeError, NodeHandler, NodeKind, NodeSpec, NodeStatus,
    ProcessEngine, ProcessError, ProcessEvent,
};

/// Counts invocations and tags its output with the node id.
struct CountingHandler {
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl NodeHandler for CountingHandler {
    async fn execute(&self, node: &NodeSpec, parameters: &Value) -> NodeResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({"node": node.id, "input": parameters}))
    }
}

/// Fails with a retryable error for the first `fail_times` calls.
struct FlakyHandler {
    fail_times: u32,
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl NodeHandler for FlakyHandler {
    async fn execute(&self, _node: &NodeSpec, _parameters: &Value) -> NodeResult<Value> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_times {
            Err(NodeError::retryable("transient glitch"))
        } else {
            Ok(json!("recovered"))
        }
    }
}

struct StubHttpClient {
    content_type: String,
    body: String,
}

#[async_trait]
impl HttpClient for StubHttpClient {
    async fn send(&self, _request: HttpRequest) -> NodeResult<HttpResponse> {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), self.content_type.clone());
        Ok(HttpResponse {
            status: 200,
            headers,
            body: self.body.clone(),
        })
    }
}

fn filter_node(id: &str, order: i64) -> NodeSpec {
    NodeSpec::new(id, "TRANSFORM", json!({"type": "FILTER"})).with_order(order)
}

#[tokio::test]
async fn empty_node_list_completes_with_initial_parameters() {
    let engine = ProcessEngine::builder().build().unwrap();
    let mut context = ExecutionContext::new(json!({"untouched": true}));
    engine.execute_with_context(vec![], &mut context).await;

    assert!(context.node_results().is_empty());
    match context.final_result() {
        FinalResult::Completed(value) => assert_eq!(value, json!({"untouched": true})),
        other => panic!("Expected Completed, got {:?}", other),
    }
}

#[tokio::test]
async fn parameters_thread_node_to_node() {
    // Three real transform nodes; each output is the next node's input.
    let nodes = vec![
        NodeSpec::new(
            "calc",
            "TRANSFORM",
            json!({"type": "CALCULATION", "rules": {"total": {"expression": "price * qty"}}}),
        )
        .with_order(1),
        NodeSpec::new(
            "rename",
            "TRANSFORM",
            json!({"type": "MAPPING", "rules": {"total": "amount", "customer": "who"}}),
        )
        .with_order(2),
        NodeSpec::new(
            "trim",
            "TRANSFORM",
            json!({"type": "FILTER", "excludeFields": ["who"]}),
        )
        .with_order(3),
    ];

    let engine = ProcessEngine::builder().build().unwrap();
    let mut context = ExecutionContext::new(json!({"customer": "acme", "price": 10, "qty": 4}));
    engine.execute_with_context(nodes, &mut context).await;

    // Every node's stored result equals what the next node consumed.
    assert_eq!(
        context.result("calc"),
        Some(&json!({"customer": "acme", "price": 10, "qty": 4, "total": 40}))
    );
    assert_eq!(
        context.result("rename"),
        Some(&json!({"amount": 40, "who": "acme"}))
    );
    assert_eq!(context.result("trim"), Some(&json!({"amount": 40})));
    match context.final_result() {
        FinalResult::Completed(value) => assert_eq!(value, json!({"amount": 40})),
        other => panic!("Expected Completed, got {:?}", other),
    }
    assert_eq!(context.node_status("calc"), Some(NodeStatus::Success));
    assert_eq!(context.node_status("trim"), Some(NodeStatus::Success));
}

#[tokio::test]
async fn failure_at_node_k_halts_and_later_nodes_never_run() {
    let calls = Arc::new(AtomicU32::new(0));
    let engine = ProcessEngine::builder()
        .handler(
            NodeKind::Transform,
            Box::new(CountingHandler {
                calls: calls.clone(),
            }),
        )
        .build()
        .unwrap();

    let nodes = vec![
        filter_node("n0", 0),
        filter_node("n1", 1),
        // Bad regex makes the conditional fail terminally.
        NodeSpec::new(
            "n2",
            "CONDITIONAL",
            json!({"type": "REGEX", "field": "node", "pattern": "["}),
        )
        .with_order(2),
        filter_node("n3", 3),
    ];

    let mut context = ExecutionContext::new(json!({"seed": 1}));
    engine.execute_with_context(nodes, &mut context).await;

    let result_ids: Vec<&str> = context
        .node_results()
        .iter()
        .map(|(id, _)| id.as_str())
        .collect();
    assert_eq!(result_ids, vec!["n0", "n1"]);
    assert_eq!(context.failed_node_id(), Some("n2"));
    assert_eq!(context.node_status("n2"), Some(NodeStatus::Failed));
    assert_eq!(context.node_status("n3"), None);
    // n3's handler was never invoked.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(context.final_result().is_failed());
}

#[tokio::test]
async fn retry_recovers_under_generous_bound() {
    let calls = Arc::new(AtomicU32::new(0));
    let engine = ProcessEngine::builder()
        .config(EngineConfig {
            max_retry_times: 3,
            ..Default::default()
        })
        .handler(
            NodeKind::Transform,
            Box::new(FlakyHandler {
                fail_times: 2,
                calls: calls.clone(),
            }),
        )
        .build()
        .unwrap();

    let result = engine.execute(vec![filter_node("flaky", 1)], json!(null)).await;
    match result {
        FinalResult::Completed(value) => assert_eq!(value, json!("recovered")),
        other => panic!("Expected Completed, got {:?}", other),
    }
    // Two failures plus the success: exactly 3 attempts.
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retry_exhaustion_fails_the_run() {
    let calls = Arc::new(AtomicU32::new(0));
    let engine = ProcessEngine::builder()
        .config(EngineConfig {
            max_retry_times: 1,
            ..Default::default()
        })
        .handler(
            NodeKind::Transform,
            Box::new(FlakyHandler {
                fail_times: 2,
                calls: calls.clone(),
            }),
        )
        .build()
        .unwrap();

    let result = engine.execute(vec![filter_node("flaky", 1)], json!(null)).await;
    match result {
        FinalResult::Failed { node_id, error } => {
            assert_eq!(node_id, "flaky");
            assert!(matches!(error, ProcessError::NodeExecutionError { .. }));
        }
        other => panic!("Expected Failed, got {:?}", other),
    }
    // max_retry_times = 1 allows exactly 2 attempts.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn expired_deadline_halts_before_the_first_node() {
    let calls = Arc::new(AtomicU32::new(0));
    let engine = ProcessEngine::builder()
        .handler(
            NodeKind::Transform,
            Box::new(CountingHandler {
                calls: calls.clone(),
            }),
        )
        .build()
        .unwrap();

    let past = chrono::Utc::now() - chrono::Duration::seconds(5);
    let mut context = ExecutionContext::new(json!(1)).with_deadline(past);
    engine
        .execute_with_context(vec![filter_node("n1", 1)], &mut context)
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    match context.final_result() {
        FinalResult::Failed { node_id, error } => {
            assert_eq!(node_id, "n1");
            assert!(matches!(error, ProcessError::DeadlineExceeded { .. }));
        }
        other => panic!("Expected Failed, got {:?}", other),
    }
}

#[tokio::test]
async fn execute_process_loads_from_definitions_source() {
    let definitions = Arc::new(InMemoryDefinitions::new());
    definitions.insert(
        "pipeline",
        vec![NodeSpec::new(
            "rename",
            "TRANSFORM",
            json!({"type": "MAPPING", "rules": {"a": "x"}}),
        )],
    );

    let engine = ProcessEngine::builder()
        .definitions(definitions)
        .build()
        .unwrap();

    let result = engine
        .execute_process("pipeline", json!({"a": 1, "b": 2}))
        .await
        .unwrap();
    match result {
        FinalResult::Completed(value) => assert_eq!(value, json!({"x": 1})),
        other => panic!("Expected Completed, got {:?}", other),
    }

    // Unknown definition: empty list, completes with the input.
    let result = engine
        .execute_process("missing", json!({"same": true}))
        .await
        .unwrap();
    match result {
        FinalResult::Completed(value) => assert_eq!(value, json!({"same": true})),
        other => panic!("Expected Completed, got {:?}", other),
    }
}

#[tokio::test]
async fn remote_call_parses_body_by_content_type() {
    let call_node = |id: &str| {
        NodeSpec::new(id, "REMOTE_CALL", json!({"apiUrl": "http://svc/api"})).with_order(1)
    };

    // JSON body.
    let engine = ProcessEngine::builder()
        .http_client(Arc::new(StubHttpClient {
            content_type: "application/json".to_string(),
            body: r#"{"answer": 42}"#.to_string(),
        }))
        .build()
        .unwrap();
    match engine.execute(vec![call_node("json")], json!(null)).await {
        FinalResult::Completed(value) => assert_eq!(value, json!({"answer": 42})),
        other => panic!("Expected Completed, got {:?}", other),
    }

    // XML body converts to the same structured shape.
    let engine = ProcessEngine::builder()
        .http_client(Arc::new(StubHttpClient {
            content_type: "text/xml".to_string(),
            body: "<resp><answer>42</answer></resp>".to_string(),
        }))
        .build()
        .unwrap();
    match engine.execute(vec![call_node("xml")], json!(null)).await {
        FinalResult::Completed(value) => assert_eq!(value, json!({"resp": {"answer": 42}})),
        other => panic!("Expected Completed, got {:?}", other),
    }

    // Anything else is raw text.
    let engine = ProcessEngine::builder()
        .http_client(Arc::new(StubHttpClient {
            content_type: "text/plain".to_string(),
            body: "just text".to_string(),
        }))
        .build()
        .unwrap();
    match engine.execute(vec![call_node("raw")], json!(null)).await {
        FinalResult::Completed(value) => assert_eq!(value, json!("just text")),
        other => panic!("Expected Completed, got {:?}", other),
    }
}

#[tokio::test]
async fn conditional_routes_the_pipeline() {
    let nodes = vec![
        NodeSpec::new(
            "score",
            "TRANSFORM",
            json!({"type": "CALCULATION", "rules": {"score": {"expression": "hits * 10"}}}),
        )
        .with_order(1),
        NodeSpec::new(
            "grade",
            "CONDITIONAL",
            json!({
                "type": "RANGE",
                "field": "score",
                "min": 50,
                "trueValue": "pass",
                "falseValue": "fail",
            }),
        )
        .with_order(2),
    ];

    let engine = ProcessEngine::builder().build().unwrap();
    match engine.execute(nodes.clone(), json!({"hits": 7})).await {
        FinalResult::Completed(value) => assert_eq!(value, json!("pass")),
        other => panic!("Expected Completed, got {:?}", other),
    }
    match engine.execute(nodes, json!({"hits": 2})).await {
        FinalResult::Completed(value) => assert_eq!(value, json!("fail")),
        other => panic!("Expected Completed, got {:?}", other),
    }
}

#[tokio::test]
async fn event_stream_covers_attempts_and_run_terminal() {
    let (tx, mut rx) = create_event_channel();
    let collector = tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    });

    let engine = ProcessEngine::builder()
        .event_sender(tx)
        .handler(
            NodeKind::Transform,
            Box::new(FlakyHandler {
                fail_times: 1,
                calls: Arc::new(AtomicU32::new(0)),
            }),
        )
        .build()
        .unwrap();

    engine.execute(vec![filter_node("flaky", 1)], json!(null)).await;
    drop(engine); // closes the channel so the collector finishes

    let events = collector.await.unwrap();
    let summary: Vec<String> = events
        .iter()
        .map(|event| match event {
            ProcessEvent::NodeStarted { attempt, .. } => format!("started:{attempt}"),
            ProcessEvent::NodeFailed {
                attempt,
                will_retry,
                ..
            } => format!("failed:{attempt}:{will_retry}"),
            ProcessEvent::NodeSucceeded {
                attempt,
                elapsed_ms: _,
                ..
            } => format!("succeeded:{attempt}"),
            ProcessEvent::RunCompleted { .. } => "run-completed".to_string(),
            ProcessEvent::RunInterrupted { .. } => "run-interrupted".to_string(),
        })
        .collect();

    assert_eq!(
        summary,
        vec![
            "started:0",
            "failed:0:true",
            "started:1",
            "succeeded:1",
            "run-completed"
        ]
    );
}

#[tokio::test]
async fn interrupted_run_emits_terminal_event() {
    let (tx, mut rx) = create_event_channel();

    let engine = ProcessEngine::builder()
        .event_sender(tx)
        .build()
        .unwrap();

    // Unknown transform sub-type fails terminally.
    let nodes = vec![NodeSpec::new("bad", "TRANSFORM", json!({"type": "PIVOT"})).with_order(1)];
    let result = engine.execute(nodes, json!(null)).await;
    assert!(result.is_failed());
    drop(engine);

    let mut saw_interrupted = false;
    while let Some(event) = rx.recv().await {
        if let ProcessEvent::RunInterrupted { node_id, .. } = event {
            assert_eq!(node_id, "bad");
            saw_interrupted = true;
        }
    }
    assert!(saw_interrupted);
}

#[tokio::test]
async fn concurrent_runs_are_independent() {
    let engine = Arc::new(ProcessEngine::builder().build().unwrap());

    let mut tasks = Vec::new();
    for i in 0..8 {
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move {
            let nodes = vec![NodeSpec::new(
                "calc",
                "TRANSFORM",
                json!({"type": "CALCULATION", "rules": {"out": {"expression": "n + 1"}}}),
            )];
            engine.execute(nodes, json!({"n": i})).await
        }));
    }

    for (i, task) in tasks.into_iter().enumerate() {
        match task.await.unwrap() {
            FinalResult::Completed(value) => {
                assert_eq!(value, json!({"n": i, "out": i + 1}));
            }
            other => panic!("Expected Completed, got {:?}", other),
        }
    }
}
