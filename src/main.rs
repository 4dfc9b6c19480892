use std::sync::Arc;

use serde_json::json;

use procflow::{FinalResult, InMemoryDefinitions, NodeSpec, ProcessEngine};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("=== procflow engine demo ===\n");

    // A small pipeline: compute an order total, keep the interesting
    // fields, then branch on the amount. No network required.
    let definitions = Arc::new(InMemoryDefinitions::new());
    definitions.insert(
        "order-pipeline",
        vec![
            NodeSpec::new(
                "total",
                "TRANSFORM",
                json!({
                    "type": "CALCULATION",
                    "rules": {
                        "total": {"expression": "price * qty"},
                        "label": {"expression": "'order for ' + customer"},
                    }
                }),
            )
            .with_order(1),
            NodeSpec::new(
                "trim",
                "TRANSFORM",
                json!({
                    "type": "FILTER",
                    "includeFields": ["customer", "total", "label"],
                }),
            )
            .with_order(2),
            NodeSpec::new(
                "tier",
                "CONDITIONAL",
                json!({
                    "type": "RANGE",
                    "field": "total",
                    "min": 100,
                    "trueValue": {"tier": "bulk", "review": true},
                    "falseValue": {"tier": "standard", "review": false},
                }),
            )
            .with_order(3),
        ],
    );

    let engine = ProcessEngine::builder()
        .definitions(definitions)
        .build()
        .expect("engine build");

    let input = json!({"customer": "acme", "price": 12.5, "qty": 10, "internal_note": "x"});
    println!("input: {input}");

    match engine.execute_process("order-pipeline", input).await {
        Ok(FinalResult::Completed(value)) => println!("completed: {value}"),
        Ok(FinalResult::Failed { node_id, error }) => {
            println!("failed at node {node_id}: {error}")
        }
        Err(e) => println!("definitions error: {e}"),
    }
}
