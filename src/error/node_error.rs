use thiserror::Error;

/// Node-level errors
///
/// Raised by node handlers during a single attempt. [`NodeError::Retryable`]
/// is the only variant the dispatcher retries; everything else halts the run
/// once it is wrapped into a [`ProcessError`](super::ProcessError).
#[derive(Debug, Clone, Error)]
pub enum NodeError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),
    #[error("Retryable failure (attempt {attempt}): {message}")]
    Retryable { attempt: u32, message: String },
    #[error("HTTP error: {0}")]
    HttpError(String),
    #[error("Expression error: {0}")]
    ExpressionError(String),
    #[error("Condition error: {0}")]
    ConditionError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl NodeError {
    /// Transient failure with the attempt counter still unset; the
    /// dispatcher stamps the real attempt number when it observes the error.
    pub fn retryable(message: impl Into<String>) -> Self {
        NodeError::Retryable {
            attempt: 0,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, NodeError::Retryable { .. })
    }
}

impl From<serde_json::Error> for NodeError {
    fn from(e: serde_json::Error) -> Self {
        NodeError::SerializationError(e.to_string())
    }
}

impl From<quick_xml::Error> for NodeError {
    fn from(e: quick_xml::Error) -> Self {
        NodeError::SerializationError(e.to_string())
    }
}
