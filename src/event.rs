//! Run observability events.
//!
//! Events are pushed over an unbounded channel so emission never blocks a
//! run; a dropped receiver silently deactivates the emitter instead of
//! failing execution.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Events describing one run, one entry per node attempt plus a terminal
/// run-level entry.
#[derive(Clone, Debug, Serialize)]
pub enum ProcessEvent {
    /// A node attempt began.
    NodeStarted {
        run_id: String,
        node_id: String,
        node_type: String,
        attempt: u32,
        timestamp: DateTime<Utc>,
    },

    /// A node attempt produced a value.
    NodeSucceeded {
        run_id: String,
        node_id: String,
        node_type: String,
        attempt: u32,
        elapsed_ms: u64,
        input: Value,
        output: Value,
        timestamp: DateTime<Utc>,
    },

    /// A node attempt failed. `will_retry` is set when the dispatcher is
    /// about to re-run the node.
    NodeFailed {
        run_id: String,
        node_id: String,
        node_type: String,
        attempt: u32,
        elapsed_ms: u64,
        error: String,
        will_retry: bool,
        timestamp: DateTime<Utc>,
    },

    /// The run walked the whole node list.
    RunCompleted {
        run_id: String,
        output: Value,
        elapsed_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The run halted early.
    RunInterrupted {
        run_id: String,
        node_id: String,
        error: String,
        elapsed_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

/// Event sender half.
pub type EventSender = mpsc::UnboundedSender<ProcessEvent>;

/// Event receiver half.
pub type EventReceiver = mpsc::UnboundedReceiver<ProcessEvent>;

/// Create an event channel.
pub fn create_event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Fire-and-forget wrapper around an optional [`EventSender`].
#[derive(Clone)]
pub struct EventEmitter {
    tx: Option<EventSender>,
    active: Arc<AtomicBool>,
}

impl EventEmitter {
    pub fn new(tx: EventSender) -> Self {
        Self {
            tx: Some(tx),
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Emitter that drops every event.
    pub fn disabled() -> Self {
        Self {
            tx: None,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    #[inline(always)]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn emit(&self, event: ProcessEvent) {
        if !self.is_active() {
            return;
        }
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                self.active.store(false, Ordering::Relaxed);
            }
        }
    }
}
