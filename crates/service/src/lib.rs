use async_trait::async_trait;
use model::{Error, Retryable, WorkflowInput};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Identifier of a started workflow execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub String);

impl Display for ExecutionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Durably hands a workflow input to the engine which will execute it.
///
/// Returning `Ok` means the input is accepted, not that the workflow ran.
#[async_trait]
pub trait WorkflowStarter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn start_execution(&self, input: &WorkflowInput) -> Result<ExecutionId, StartError>;
}

/// Errors arising from starting a workflow execution.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    // The input couldn't be encoded for the engine
    #[error("workflow input couldn't be encoded: {0}")]
    BadRequest(String),
    // An error from the engine or its transport
    #[error("starting the workflow failed: {source}")]
    Backend { source: Error, retryable: bool },
}

impl Retryable for StartError {
    fn is_retryable(&self) -> bool {
        match self {
            StartError::BadRequest(_) => false,
            StartError::Backend { retryable, .. } => *retryable,
        }
    }
}

/// Outcome of a callback which reached the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackReceipt {
    pub status_code: u16,
}

impl CallbackReceipt {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Writes a body once to a caller supplied endpoint.
/// Implementations must not retry, the endpoint accepts a single write.
#[async_trait]
pub trait CallbackSender: Send + Sync {
    async fn put(&self, url: &str, body: String) -> Result<CallbackReceipt, CallbackError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("invalid callback url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("callback transport failed: {0}")]
    Transport(Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_error_keeps_backend_classification() {
        let throttled = StartError::Backend {
            source: "throttled".into(),
            retryable: true,
        };

        assert!(throttled.is_retryable());
        assert!(!StartError::BadRequest("not json".to_string()).is_retryable());
    }

    #[test]
    fn only_2xx_receipts_are_successful() {
        assert!(CallbackReceipt { status_code: 200 }.is_success());
        assert!(!CallbackReceipt { status_code: 403 }.is_success());
    }
}
