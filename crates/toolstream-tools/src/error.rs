use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure raised while resolving or running an operation.
///
/// These never abort a conversation: the tool dispatcher folds them into a
/// `failed` [`OperationResult`](crate::OperationResult) envelope.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum OperationError {
    #[error("Unknown operation type: {name}")]
    UnknownOperation { name: String },

    #[error("Invalid parameters for {operation}: {message}")]
    InvalidParams { operation: String, message: String },

    #[error("Invalid parameters for operation {operation}")]
    ValidationFailed { operation: String },

    #[error("{operation} failed: {message}")]
    Execution { operation: String, message: String },
}

impl OperationError {
    pub fn unknown<N: Into<String>>(name: N) -> Self {
        OperationError::UnknownOperation { name: name.into() }
    }

    pub fn invalid_params<O: Into<String>, M: Into<String>>(operation: O, message: M) -> Self {
        OperationError::InvalidParams {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn execution<O: Into<String>, M: Into<String>>(operation: O, message: M) -> Self {
        OperationError::Execution {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn operation_name(&self) -> &str {
        match self {
            OperationError::UnknownOperation { name } => name,
            OperationError::InvalidParams { operation, .. }
            | OperationError::ValidationFailed { operation }
            | OperationError::Execution { operation, .. } => operation,
        }
    }
}
