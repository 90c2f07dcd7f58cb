use serde::{Deserialize, Serialize};

use crate::error::OperationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Ok,
    Failed,
}

/// Envelope written as the content of a `tool` message.
///
/// Serializes as `{"status":"ok"|"failed","info":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub status: OperationStatus,
    pub info: String,
}

impl OperationResult {
    pub fn ok(info: impl Into<String>) -> Self {
        Self {
            status: OperationStatus::Ok,
            info: info.into(),
        }
    }

    pub fn failed(info: impl Into<String>) -> Self {
        Self {
            status: OperationStatus::Failed,
            info: info.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == OperationStatus::Ok
    }

    /// Serialized form used as tool message content.
    pub fn to_content(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            let status = match self.status {
                OperationStatus::Ok => "ok",
                OperationStatus::Failed => "failed",
            };
            serde_json::json!({ "status": status, "info": self.info }).to_string()
        })
    }
}

impl From<Result<String, OperationError>> for OperationResult {
    fn from(result: Result<String, OperationError>) -> Self {
        match result {
            Ok(info) => OperationResult::ok(info),
            Err(err) => OperationResult::failed(err.to_string()),
        }
    }
}
