//! # procflow — a sequential process execution engine
//!
//! `procflow` runs a user-defined pipeline of typed steps ("nodes") against
//! a piece of input data, threading each node's output into the next and
//! producing either a final value or a captured failure:
//!
//! - **Node types**: remote call (HTTP), data transform
//!   (mapping/filter/calculation), and conditional branch, dispatched through
//!   a per-kind handler registry.
//! - **Embedded evaluation**: a minimal expression language for calculated
//!   fields and script conditions, plus a recursive condition evaluator with
//!   simple/range/regex/script/complex/composite variants.
//! - **Bounded retry**: handlers signal transient failures explicitly; the
//!   dispatcher retries them in place, immediately, up to a per-run bound.
//! - **Failure as data**: a halted run returns [`FinalResult::Failed`] with
//!   the captured error; `execute` itself never fails.
//! - **Observability**: per-attempt and per-run events over a fire-and-forget
//!   channel, `tracing` logs throughout.
//!
//! # Quick Start
//!
//! ```rust
//! use procflow::{NodeSpec, ProcessEngine};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = ProcessEngine::builder().build().unwrap();
//!     let nodes = vec![NodeSpec::new(
//!         "rename",
//!         "TRANSFORM",
//!         json!({"type": "MAPPING", "rules": {"name": "user"}}),
//!     )];
//!     let result = engine.execute(nodes, json!({"name": "bob"})).await;
//!     println!("{:?}", result);
//! }
//! ```

pub mod config;
pub mod context;
pub mod definition;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod event;
pub mod http;
pub mod nodes;
pub mod transform;
pub mod xml;

pub use config::EngineConfig;
pub use context::{ExecutionContext, FinalResult, NodeStatus};
pub use definition::{DefinitionSource, InMemoryDefinitions, NodeKind, NodeSpec};
pub use engine::{ProcessEngine, ProcessEngineBuilder};
pub use error::{NodeError, ProcessError};
pub use event::{create_event_channel, EventReceiver, EventSender, ProcessEvent};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use nodes::{HandlerRegistry, NodeHandler};
