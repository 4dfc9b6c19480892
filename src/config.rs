//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the process engine
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Upper bound on retries per node; attempt `a` is retried while
    /// `a < max_retry_times`, so a node runs at most `max_retry_times + 1`
    /// times.
    #[serde(default = "default_max_retry_times")]
    pub max_retry_times: u32,
    /// Per-call timeout for remote-call nodes that do not configure their
    /// own, in milliseconds.
    #[serde(default = "default_call_timeout_ms")]
    pub default_call_timeout_ms: u64,
    /// Overall run budget in milliseconds. When set, the engine derives the
    /// context deadline at run start; the deadline is checked at node
    /// boundaries, never mid-node.
    #[serde(default)]
    pub run_timeout_ms: Option<u64>,
}

fn default_max_retry_times() -> u32 {
    3
}

fn default_call_timeout_ms() -> u64 {
    5000
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_retry_times: 3,
            default_call_timeout_ms: 5000,
            run_timeout_ms: None,
        }
    }
}
