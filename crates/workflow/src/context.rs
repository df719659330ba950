use crate::mutation::MutationOutcome;
use crate::response::DeliveryReport;
use model::{ErrorInfo, LifecycleEvent, WorkflowInput};
use serde::{Deserialize, Serialize};

/// The document flowing through the states of one execution.
///
/// Each state writes its result under its own field, so a caught error never
/// overwrites the input and the response task can see both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionState {
    #[serde(flatten)]
    pub input: WorkflowInput,
    /// Result of the mutation task on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<MutationOutcome>,
    /// Error caught from the mutation task, or the unsupported request type.
    #[serde(rename = "errorInfo", default, skip_serializing_if = "Option::is_none")]
    pub error_info: Option<ErrorInfo>,
    /// Outcome of the callback.
    #[serde(rename = "cfnResponse", default, skip_serializing_if = "Option::is_none")]
    pub cfn_response: Option<DeliveryReport>,
}

impl ExecutionState {
    pub fn new(input: WorkflowInput) -> Self {
        ExecutionState {
            input,
            output: None,
            error_info: None,
            cfn_response: None,
        }
    }

    pub fn event(&self) -> &LifecycleEvent {
        &self.input.event
    }

    /// Whether the error recorded by the choice is the unsupported request type.
    pub fn is_unsupported_request(&self) -> bool {
        self.error_info
            .as_ref()
            .is_some_and(|error_info| error_info.error == crate::graph::UNSUPPORTED_REQUEST_TYPE)
    }
}
