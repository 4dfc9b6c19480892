//! Error types for the process engine.
//!
//! - [`NodeError`] — Errors raised inside a single node attempt.
//! - [`ProcessError`] — Errors that halt a run, captured into the context.

pub mod node_error;
pub mod process_error;

pub use node_error::NodeError;
pub use process_error::ProcessError;

/// Convenience alias for run-level results.
pub type ProcessResult<T> = Result<T, ProcessError>;
/// Convenience alias for node-level results.
pub type NodeResult<T> = Result<T, NodeError>;
