use crate::context::ExecutionState;
use lambda_runtime::tracing;
use model::{CallbackBody, ErrorInfo, ResponseEnvelope};
use serde::{Deserialize, Serialize};
use service::{CallbackReceipt, CallbackSender};
use std::sync::Arc;

/// Error name used when the response task finds neither an output nor an error.
pub const MISSING_TASK_OUTPUT: &str = "MissingTaskOutput";

/// Outcome of the single callback attempt, kept under `cfnResponse`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReport {
    pub envelope: ResponseEnvelope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryReport {
    /// Whether the endpoint accepted the body.
    pub fn is_delivered(&self) -> bool {
        self.status_code.is_some_and(|code| (200..300).contains(&code))
    }
}

/// Composes the terminal response of an execution and sends it once.
pub struct ResponseDelivery {
    sender: Arc<dyn CallbackSender>,
}

impl ResponseDelivery {
    pub fn new(sender: Arc<dyn CallbackSender>) -> Self {
        ResponseDelivery { sender }
    }

    pub fn compose(state: &ExecutionState) -> ResponseEnvelope {
        let physical_resource_id: Option<String> = state.event().physical_resource_id();

        if let Some(error_info) = &state.error_info {
            return ResponseEnvelope::failed(physical_resource_id, error_info.clone());
        }

        match &state.output {
            Some(outcome) => ResponseEnvelope::success(physical_resource_id, outcome.response_data())
                .with_reason(format!(
                    "Resource {} completed",
                    outcome.record.last_operation
                )),
            None => ResponseEnvelope::failed(
                physical_resource_id,
                ErrorInfo::new(MISSING_TASK_OUTPUT, "No task output was recorded"),
            ),
        }
    }

    /// PUT the envelope to `url`. Failures are reported, never retried.
    pub async fn deliver(&self, url: &str, envelope: ResponseEnvelope) -> DeliveryReport {
        let body: String = match CallbackBody::from_envelope(&envelope)
            .and_then(|body| serde_json::to_string(&body))
        {
            Ok(body) => body,
            Err(err) => {
                tracing::error!("Failed to encode callback body: {err}");

                return DeliveryReport {
                    envelope,
                    status_code: None,
                    error: Some(err.to_string()),
                };
            }
        };

        tracing::info!(
            status = envelope.status.as_str(),
            content_length = body.len(),
            "Sending callback"
        );

        match self.sender.put(url, body).await {
            Ok(CallbackReceipt { status_code }) => {
                if (200..300).contains(&status_code) {
                    tracing::info!(status_code, "Callback accepted");
                } else {
                    tracing::error!(status_code, "Callback rejected");
                }

                DeliveryReport {
                    envelope,
                    status_code: Some(status_code),
                    error: None,
                }
            }
            Err(err) => {
                tracing::error!("Callback could not be delivered: {err}");

                DeliveryReport {
                    envelope,
                    status_code: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }
}
