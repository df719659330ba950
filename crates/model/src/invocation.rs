use crate::event::LifecycleEvent;
use serde::{Deserialize, Serialize};

/// This id is used for tracing and storage.
pub trait InvocationId {
    fn invocation_id(&self) -> &str;
}

/// Details of the dispatching invocation, passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationContext {
    pub aws_request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoked_function_arn: Option<String>,
    /// Deadline of the dispatching invocation in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
}

/// Payload handed to the workflow.
/// It must stay self-contained as it may be executed by another process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInput {
    #[serde(rename = "cfnEvent")]
    pub event: LifecycleEvent,
    #[serde(rename = "cfnContext", default)]
    pub context: InvocationContext,
}

impl WorkflowInput {
    pub fn new(event: LifecycleEvent, context: InvocationContext) -> Self {
        WorkflowInput { event, context }
    }
}

impl InvocationId for WorkflowInput {
    fn invocation_id(&self) -> &str {
        self.event
            .request_id
            .as_deref()
            .unwrap_or(self.context.aws_request_id.as_str())
    }
}
