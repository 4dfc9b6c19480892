//! Run-level error types.

use super::NodeError;
use thiserror::Error;

/// Run-level errors
///
/// Produced by the dispatcher and orchestrator. A halted run stores one of
/// these in its context as the captured failure; only
/// [`ProcessError::DefinitionError`] ever surfaces as an `Err` from the
/// engine API.
#[derive(Debug, Clone, Error)]
pub enum ProcessError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Deadline exceeded before node {node_id} started")]
    DeadlineExceeded { node_id: String },
    #[error("Unsupported node type: {0}")]
    UnsupportedType(String),
    #[error("Node execution failed: node={node_id}, error={source}")]
    NodeExecutionError {
        node_id: String,
        #[source]
        source: NodeError,
    },
    #[error("Definition source error: {0}")]
    DefinitionError(String),
}

impl ProcessError {
    /// The node the failure is attributed to, when there is one.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            ProcessError::DeadlineExceeded { node_id } => Some(node_id),
            ProcessError::NodeExecutionError { node_id, .. } => Some(node_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_error_display() {
        assert_eq!(
            ProcessError::ValidationError("node type must not be empty".into()).to_string(),
            "Validation error: node type must not be empty"
        );
        assert_eq!(
            ProcessError::DeadlineExceeded {
                node_id: "n1".into()
            }
            .to_string(),
            "Deadline exceeded before node n1 started"
        );
        assert_eq!(
            ProcessError::UnsupportedType("FAN_OUT".into()).to_string(),
            "Unsupported node type: FAN_OUT"
        );
        assert_eq!(
            ProcessError::DefinitionError("store offline".into()).to_string(),
            "Definition source error: store offline"
        );
    }

    #[test]
    fn test_node_execution_error_carries_cause() {
        let err = ProcessError::NodeExecutionError {
            node_id: "n2".into(),
            source: NodeError::HttpError("status 502".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("n2"));
        assert!(msg.contains("status 502"));
    }

    #[test]
    fn test_node_id_attribution() {
        let err = ProcessError::NodeExecutionError {
            node_id: "n3".into(),
            source: NodeError::ExpressionError("unbound variable".into()),
        };
        assert_eq!(err.node_id(), Some("n3"));
        assert_eq!(
            ProcessError::ValidationError("x".into()).node_id(),
            None
        );
    }

    #[test]
    fn test_retryable_helper() {
        let err = NodeError::retryable("connection reset");
        assert!(err.is_retryable());
        assert!(err.to_string().contains("connection reset"));
        assert!(!NodeError::HttpError("x".into()).is_retryable());
    }
}
