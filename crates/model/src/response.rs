use crate::event::EventIdentity;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseStatus {
    Success,
    Failed,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Success => "SUCCESS",
            ResponseStatus::Failed => "FAILED",
        }
    }
}

/// Error captured by a catch edge of the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorInfo {
    /// Name of the error, used for branching.
    pub error: String,
    pub cause: String,
}

impl ErrorInfo {
    pub fn new(error: impl Into<String>, cause: impl Into<String>) -> Self {
        ErrorInfo {
            error: error.into(),
            cause: cause.into(),
        }
    }
}

/// The single terminal answer produced for a lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_info: Option<ErrorInfo>,
}

impl ResponseEnvelope {
    pub fn success(physical_resource_id: Option<String>, data: Map<String, Value>) -> Self {
        ResponseEnvelope {
            status: ResponseStatus::Success,
            physical_resource_id,
            data,
            reason: None,
            error_info: None,
        }
    }

    pub fn failed(physical_resource_id: Option<String>, error_info: ErrorInfo) -> Self {
        ResponseEnvelope {
            status: ResponseStatus::Failed,
            physical_resource_id,
            data: Map::new(),
            reason: Some(error_info.cause.clone()),
            error_info: Some(error_info),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    /// The explicit reason, or a generic one derived from the status.
    pub fn reason_or_default(&self) -> String {
        match (&self.reason, self.status) {
            (Some(reason), _) => reason.clone(),
            (None, ResponseStatus::Success) => "Completed successfully".to_string(),
            (None, ResponseStatus::Failed) => "Failed without further details".to_string(),
        }
    }
}

/// Body written to the wait-condition callback URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallbackBody {
    pub status: ResponseStatus,
    pub reason: String,
    pub unique_id: Option<String>,
    /// JSON encoded `data` map of the envelope.
    pub data: String,
}

impl CallbackBody {
    pub fn from_envelope(envelope: &ResponseEnvelope) -> Result<Self, serde_json::Error> {
        Ok(CallbackBody {
            status: envelope.status,
            reason: envelope.reason_or_default(),
            unique_id: envelope.physical_resource_id.clone(),
            data: serde_json::to_string(&envelope.data)?,
        })
    }
}

/// Body acknowledging a custom resource request on its `ResponseURL`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProviderAcknowledgment {
    pub status: ResponseStatus,
    pub reason: String,
    pub physical_resource_id: String,
    pub stack_id: Option<String>,
    pub request_id: Option<String>,
    pub logical_resource_id: Option<String>,
    pub no_echo: bool,
    pub data: Map<String, Value>,
}

impl ProviderAcknowledgment {
    /// Falls back to `fallback_id` when the envelope never learned an identity,
    /// as the protocol requires one on every acknowledgment.
    pub fn new(identity: &EventIdentity, envelope: &ResponseEnvelope, fallback_id: &str) -> Self {
        ProviderAcknowledgment {
            status: envelope.status,
            reason: envelope.reason_or_default(),
            physical_resource_id: envelope
                .physical_resource_id
                .clone()
                .unwrap_or_else(|| fallback_id.to_string()),
            stack_id: identity.stack_id.clone(),
            request_id: identity.request_id.clone(),
            logical_resource_id: identity.logical_resource_id.clone(),
            no_echo: false,
            data: envelope.data.clone(),
        }
    }
}
